//! Report Pipeline
//! Runs Load -> Clean -> Aggregate -> Render (-> Bundle) once, front to back.
//!
//! There is no retry or resume: the first failing stage aborts the run and is
//! named in the error.

use crate::bundle::{BundleError, BundleWriter};
use crate::charts::{Artifacts, RenderError, Report, ReportRenderer};
use crate::config::BuildConfig;
use crate::data::{Cleaner, DataLoader, LoaderError};
use crate::stats::{Aggregate, AggregateError, Aggregator, CrossTab, CrossTabulator};
use crate::summary::RunSummary;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Clean,
    Aggregate,
    Render,
    Bundle,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Clean => "clean",
            Stage::Aggregate => "aggregate",
            Stage::Render => "render",
            Stage::Bundle => "bundle",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("malformed input: {0}")]
    MalformedInput(#[from] LoaderError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
}

/// A fatal error, tagged with the stage it happened in.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    fn at(stage: Stage) -> impl FnOnce(StageError) -> PipelineError {
        move |source| PipelineError { stage, source }
    }
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub aggregates: Vec<Aggregate>,
    pub crosstab: CrossTab,
    pub artifacts: Artifacts,
    pub bundle: Option<PathBuf>,
}

pub struct Pipeline {
    config: BuildConfig,
}

impl Pipeline {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let config = &self.config;
        let input_name = config.input_name();

        info!("[{}] {}", Stage::Load, config.input.display());
        let table = DataLoader::load_csv(&config.input)
            .map_err(StageError::from)
            .map_err(PipelineError::at(Stage::Load))?;

        info!("[{}] {} rows", Stage::Clean, table.row_count());
        let cleaned = Cleaner::new(config.vocabularies.clone()).clean(&table);

        info!("[{}] {} records", Stage::Aggregate, cleaned.records.len());
        let aggregates = Aggregator::aggregate_all(&cleaned.records, &config.fields)
            .map_err(StageError::from)
            .map_err(PipelineError::at(Stage::Aggregate))?;
        let crosstab = CrossTabulator::build(&cleaned.records)
            .map_err(StageError::from)
            .map_err(PipelineError::at(Stage::Aggregate))?;

        let mut summary = RunSummary::new(&input_name, &cleaned);
        summary.record_empty_aggregates(&aggregates);
        if !summary.warnings.is_empty() {
            warn!("{} data quality warnings", summary.warnings.len());
        }

        info!("[{}] {}", Stage::Render, config.out_dir.display());
        let report = Report {
            title: config.title.clone(),
            summary,
            aggregates,
            crosstab,
            incidents: cleaned.records,
        };
        let artifacts = ReportRenderer::write_artifacts(&report, &config.out_dir)
            .map_err(StageError::from)
            .map_err(PipelineError::at(Stage::Render))?;

        let bundle = match &config.bundle {
            Some(path) => {
                info!("[{}] {}", Stage::Bundle, path.display());
                let mut entries = artifacts.entries();
                entries.push((format!("data/{}", input_name), config.input.clone()));
                BundleWriter::write(path, &entries)
                    .map_err(StageError::from)
                    .map_err(PipelineError::at(Stage::Bundle))?;
                Some(path.clone())
            }
            None => None,
        };

        let Report {
            summary,
            aggregates,
            crosstab,
            ..
        } = report;
        Ok(RunReport {
            summary,
            aggregates,
            crosstab,
            artifacts,
            bundle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::VocabularySet;
    use crate::stats::GroupField;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const HEADER: &str = "Reference Title,Reference Link,Short Title,Description of Patient Harm,Direct Quote,Time Point,Speciality,Technical Domain,Clinical Impact Score";

    fn write_csv(dir: &Path, rows: &[&str]) -> PathBuf {
        let path = dir.join("cipher.csv");
        let mut content = format!("{}\n", HEADER);
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn sample_rows() -> Vec<&'static str> {
        vec![
            "Lancet,https://example.org/1,Delayed bloods,Results delayed,\"quote\",First Day,Cardiology,Laboratory,7",
            "Social Media,,Lost scripts,Prescriptions lost,,Hour Zero,cardiology ,Pharmacy,8",
            "BMJ,,Chemo paused,Chemotherapy paused,,First Week,Oncology,Pharmacy,9",
        ]
    }

    #[test]
    fn test_run_aggregates_normalized_specialties() {
        let temp = TempDir::new().unwrap();
        let input = write_csv(temp.path(), &sample_rows());
        let out = temp.path().join("site");

        let report = Pipeline::new(BuildConfig::new(&input, &out)).run().unwrap();
        assert_eq!(report.aggregates.len(), 1);
        assert_eq!(
            report.aggregates[0].counts(),
            vec![("Cardiology", 2), ("Oncology", 1)]
        );
        assert_eq!(report.summary.valid_rows, 3);
        assert_eq!(report.summary.rejected_rows, 0);
        assert!(out.join("index.html").exists());
        assert!(out.join("charts/specialty.svg").exists());
        assert!(out.join("summary.json").exists());
    }

    #[test]
    fn test_counts_sum_to_valid_rows() {
        let temp = TempDir::new().unwrap();
        let input = write_csv(temp.path(), &sample_rows());
        let config = BuildConfig::new(&input, temp.path().join("site")).with_fields(&[
            GroupField::Domain,
            GroupField::TimePoint,
            GroupField::Source,
        ]);

        let report = Pipeline::new(config).run().unwrap();
        for agg in &report.aggregates {
            let sum: usize = agg.categories.iter().map(|c| c.count).sum();
            assert_eq!(sum, report.summary.valid_rows, "field {}", agg.field);
        }
        let source = &report.aggregates[2];
        assert_eq!(source.counts(), vec![("Academic", 2), ("Social Media", 1)]);
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let temp = TempDir::new().unwrap();
        let input = write_csv(temp.path(), &sample_rows());
        let fields = [GroupField::Specialty, GroupField::Domain];

        let run = |name: &str| {
            let out = temp.path().join(name);
            let config = BuildConfig::new(&input, &out)
                .with_fields(&fields)
                .with_bundle(Some(temp.path().join(format!("{name}.zip"))));
            Pipeline::new(config).run().unwrap();
            out
        };
        let a = run("a");
        let b = run("b");

        for file in [
            "index.html",
            "summary.json",
            "charts/specialty.svg",
            "charts/domain.svg",
        ] {
            assert_eq!(
                fs::read(a.join(file)).unwrap(),
                fs::read(b.join(file)).unwrap(),
                "{file} differs between runs"
            );
        }
        assert_eq!(
            fs::read(temp.path().join("a.zip")).unwrap(),
            fs::read(temp.path().join("b.zip")).unwrap()
        );
    }

    #[test]
    fn test_free_text_time_points_form_one_category() {
        let temp = TempDir::new().unwrap();
        let input = write_csv(
            temp.path(),
            &[
                "BMJ,,A,d,,Day 3,Cardiology,Lab,5",
                "BMJ,,B,d,,day 3 ,Cardiology,Lab,5",
                "BMJ,,C,d,,DAY 3,Cardiology,LAB ,5",
            ],
        );
        let config = BuildConfig::new(&input, temp.path().join("site"))
            .with_fields(&[GroupField::TimePoint, GroupField::Domain]);

        let report = Pipeline::new(config).run().unwrap();
        assert_eq!(report.aggregates[0].counts(), vec![("Day 3", 3)]);
        assert_eq!(report.aggregates[1].counts(), vec![("Lab", 3)]);
        assert_eq!(report.crosstab.time_points, vec!["Day 3"]);
        assert_eq!(report.crosstab.cell("Lab", "Day 3").unwrap().count, 3);
    }

    #[test]
    fn test_crosstab_is_rendered_and_summarised() {
        let temp = TempDir::new().unwrap();
        let input = write_csv(temp.path(), &sample_rows());
        let out = temp.path().join("site");

        let report = Pipeline::new(BuildConfig::new(&input, &out)).run().unwrap();
        assert_eq!(report.crosstab.domains, vec!["Laboratory", "Pharmacy"]);
        assert_eq!(report.crosstab.time_points, vec!["Hour 0", "Day 1", "Week 1"]);
        assert_eq!(report.crosstab.cell("Pharmacy", "Week 1").unwrap().count, 1);

        let html = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(html.contains(r#"id="domain-by-time""#));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("summary.json")).unwrap()).unwrap();
        assert_eq!(json["crosstab"]["total"], 3);
        assert_eq!(json["crosstab"]["time_points"][0], "Hour 0");
    }

    #[test]
    fn test_missing_required_field_is_excluded_and_reported() {
        let temp = TempDir::new().unwrap();
        let mut rows = sample_rows();
        rows.push("BMJ,,,No title given,,First Day,Oncology,Imaging,3");
        let input = write_csv(temp.path(), &rows);

        let report = Pipeline::new(BuildConfig::new(&input, temp.path().join("site")))
            .run()
            .unwrap();
        assert_eq!(report.summary.total_rows, 4);
        assert_eq!(report.summary.valid_rows, 3);
        assert_eq!(report.summary.rejections_by_reason["missing_required_field"], 1);
        assert_eq!(report.summary.rejections[0].row, 4);
        assert_eq!(report.aggregates[0].get("Oncology").unwrap().count, 1);
    }

    #[test]
    fn test_header_only_file_renders_no_data() {
        let temp = TempDir::new().unwrap();
        let input = write_csv(temp.path(), &[]);
        let out = temp.path().join("site");

        let report = Pipeline::new(BuildConfig::new(&input, &out)).run().unwrap();
        assert!(report.aggregates[0].is_empty());
        assert_eq!(report.summary.empty_aggregates, vec![GroupField::Specialty]);

        let svg = fs::read_to_string(out.join("charts/specialty.svg")).unwrap();
        assert!(svg.contains("No data"));
        let html = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(html.contains("No data"));
    }

    #[test]
    fn test_field_count_mismatch_fails_at_load_stage() {
        let temp = TempDir::new().unwrap();
        let mut rows = sample_rows();
        rows.push("BMJ,too,few,fields");
        let input = write_csv(temp.path(), &rows);
        let out = temp.path().join("site");

        let err = Pipeline::new(BuildConfig::new(&input, &out)).run().unwrap_err();
        assert_eq!(err.stage, Stage::Load);
        assert!(matches!(
            err.source,
            StageError::MalformedInput(LoaderError::FieldCount { line: 5, .. })
        ));
        assert!(err.to_string().starts_with("load stage failed: malformed input"));
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_input_fails_at_load_stage() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path().join("absent.csv"), temp.path().join("site"));
        let err = Pipeline::new(config).run().unwrap_err();
        assert_eq!(err.stage, Stage::Load);
    }

    #[test]
    fn test_closed_vocabulary_rejects_unknown_category() {
        let temp = TempDir::new().unwrap();
        let input = write_csv(temp.path(), &sample_rows());
        let vocab = VocabularySet::from_json_str(
            r#"{ "specialty": { "closed": true, "terms": { "Cardiology": ["cardiac"] } } }"#,
        )
        .unwrap();
        let config = BuildConfig::new(&input, temp.path().join("site")).with_vocabularies(vocab);

        let report = Pipeline::new(config).run().unwrap();
        assert_eq!(report.aggregates[0].counts(), vec![("Cardiology", 2)]);
        assert_eq!(report.summary.rejections_by_reason["unknown_category"], 1);
    }

    #[test]
    fn test_bundle_includes_source_dataset() {
        let temp = TempDir::new().unwrap();
        let input = write_csv(temp.path(), &sample_rows());
        let zip_path = temp.path().join("release.zip");
        let config = BuildConfig::new(&input, temp.path().join("site"))
            .with_bundle(Some(zip_path.clone()));

        let report = Pipeline::new(config).run().unwrap();
        assert_eq!(report.bundle, Some(zip_path.clone()));

        let archive = zip::ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"index.html"));
        assert!(names.contains(&"charts/specialty.svg"));
        assert!(names.contains(&"data/cipher.csv"));
    }
}
