//! CIPHER Report - Dataset report builder
//!
//! Reads the CIPHER patient-harm CSV, cleans and aggregates it, and writes the
//! static charts and page served by the project site.

mod bundle;
mod charts;
mod config;
mod data;
mod pipeline;
mod stats;
mod summary;

use anyhow::Context;
use clap::Parser;
use config::{BuildConfig, DEFAULT_INPUT, DEFAULT_OUT_DIR, DEFAULT_TITLE};
use data::VocabularySet;
use pipeline::Pipeline;
use stats::GroupField;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cipher-report")]
#[command(about = "Build static charts and an HTML report from the CIPHER dataset")]
struct Cli {
    /// Input CSV file
    #[arg(short, long, env = "CIPHER_INPUT", default_value = DEFAULT_INPUT)]
    input: PathBuf,
    /// Output directory for index.html, charts/ and summary.json
    #[arg(short, long, env = "CIPHER_OUT_DIR", default_value = DEFAULT_OUT_DIR)]
    out_dir: PathBuf,
    /// Field to aggregate by (repeatable)
    #[arg(short, long = "group-by", value_enum, default_values_t = [GroupField::Specialty])]
    group_by: Vec<GroupField>,
    /// JSON vocabulary file for specialty and domain normalization
    #[arg(long, env = "CIPHER_VOCABULARY")]
    vocabulary: Option<PathBuf>,
    /// Also write a release ZIP with the artifacts and the dataset
    #[arg(long)]
    bundle: Option<PathBuf>,
    /// Page title
    #[arg(long, default_value = DEFAULT_TITLE)]
    title: String,
    /// Open the generated page in the default browser
    #[arg(long)]
    open: bool,
    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn log_directive(quiet: bool) -> &'static str {
    if quiet {
        "cipher_report=warn"
    } else {
        "cipher_report=info"
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_directive(cli.quiet).parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = BuildConfig::new(&cli.input, &cli.out_dir)
        .with_fields(&cli.group_by)
        .with_title(cli.title)
        .with_bundle(cli.bundle);
    if let Some(path) = &cli.vocabulary {
        let vocabularies = VocabularySet::load(path)
            .with_context(|| format!("loading vocabulary {}", path.display()))?;
        config = config.with_vocabularies(vocabularies);
    }

    let report = Pipeline::new(config).run()?;
    print!("{}", report.summary);
    for aggregate in &report.aggregates {
        println!(
            "{}: {} categories over {} incidents",
            aggregate.field.label(),
            aggregate.categories.len(),
            aggregate.records
        );
    }
    println!(
        "Domain x time point: {} x {} cells, {} filled",
        report.crosstab.domains.len(),
        report.crosstab.time_points.len(),
        report.crosstab.cells.len()
    );
    println!("Wrote {}", report.artifacts.index.display());
    if let Some(bundle) = &report.bundle {
        println!("Wrote {}", bundle.display());
    }

    if cli.open {
        if let Err(e) = open::that(&report.artifacts.index) {
            tracing::warn!("Could not open {}: {}", report.artifacts.index.display(), e);
        }
    }

    Ok(())
}
