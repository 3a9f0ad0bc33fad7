//! Static Report Renderer
//! Writes the chart SVGs, the HTML page and the JSON summary for the static site.
//!
//! Layout of the page:
//! 1. Header with title and dataset name
//! 2. One section per aggregate: chart image + category table
//! 3. Technical domain x time point grid, shaded by count
//! 4. Incident index: one row per accepted record
//! 5. Data quality: valid vs rejected rows, reasons, warnings
//!
//! Output must be byte-identical for identical input, so nothing here may
//! depend on the clock, the environment or hash ordering.

use crate::charts::ChartPlotter;
use crate::data::Record;
use crate::stats::{Aggregate, CrossTab, CONFIDENCE_LEVEL};
use crate::summary::RunSummary;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const INDEX_FILE: &str = "index.html";
pub const SUMMARY_FILE: &str = "summary.json";
pub const CHARTS_DIR: &str = "charts";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("chart drawing failed: {0}")]
    Chart(String),
    #[error("failed to serialize summary: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything the renderer needs for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub title: String,
    pub summary: RunSummary,
    pub aggregates: Vec<Aggregate>,
    pub crosstab: CrossTab,
    /// Accepted records, listed on the page but kept out of summary.json.
    #[serde(skip)]
    pub incidents: Vec<Record>,
}

/// Files written by a render.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub index: PathBuf,
    pub summary: PathBuf,
    pub charts: Vec<PathBuf>,
}

impl Artifacts {
    /// (archive name, file path) pairs in a fixed order.
    pub fn entries(&self) -> Vec<(String, PathBuf)> {
        let mut entries = vec![
            (INDEX_FILE.to_string(), self.index.clone()),
            (SUMMARY_FILE.to_string(), self.summary.clone()),
        ];
        for chart in &self.charts {
            let name = chart
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            entries.push((format!("{}/{}", CHARTS_DIR, name), chart.clone()));
        }
        entries
    }
}

fn chart_file(aggregate: &Aggregate) -> String {
    format!("{}.svg", aggregate.field.slug())
}

fn write_file(path: &Path, content: &str) -> Result<(), RenderError> {
    fs::write(path, content).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Renders a [`Report`] into static files.
pub struct ReportRenderer;

impl ReportRenderer {
    /// Write charts, page and summary under `out_dir`, replacing older files.
    pub fn write_artifacts(report: &Report, out_dir: &Path) -> Result<Artifacts, RenderError> {
        let charts_dir = out_dir.join(CHARTS_DIR);
        fs::create_dir_all(&charts_dir).map_err(|source| RenderError::Io {
            path: charts_dir.clone(),
            source,
        })?;

        let mut charts = Vec::with_capacity(report.aggregates.len());
        for aggregate in &report.aggregates {
            let svg = ChartPlotter::render_svg(aggregate)?;
            let path = charts_dir.join(chart_file(aggregate));
            write_file(&path, &svg)?;
            debug!("Wrote {}", path.display());
            charts.push(path);
        }

        let index = out_dir.join(INDEX_FILE);
        write_file(&index, &Self::render_html(report))?;

        let summary = out_dir.join(SUMMARY_FILE);
        let mut json = serde_json::to_string_pretty(report)?;
        json.push('\n');
        write_file(&summary, &json)?;

        info!(
            "Wrote {} charts, {} and {} to {}",
            charts.len(),
            INDEX_FILE,
            SUMMARY_FILE,
            out_dir.display()
        );

        Ok(Artifacts {
            index,
            summary,
            charts,
        })
    }

    /// Render the full HTML page.
    pub fn render_html(report: &Report) -> String {
        let sections: String = report
            .aggregates
            .iter()
            .map(Self::render_aggregate_section)
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{css}</style>
</head>
<body>
    <div class="wrap">
        <header>
            <span class="badge">CIPHER Platform</span>
            <h1>{title}</h1>
            <p class="subtitle">Documented patient harms during hospital cyberattacks, summarised from <code>{input}</code>: {valid} of {total} incidents included.</p>
        </header>
{sections}{crosstab}{incidents}{quality}
        <footer>Static report built from the CIPHER dataset. Interpretation is for situational awareness, not clinical guidance.</footer>
    </div>
</body>
</html>
"#,
            title = html_escape(&report.title),
            css = inline_css(),
            input = html_escape(&report.summary.input),
            valid = report.summary.valid_rows,
            total = report.summary.total_rows,
            sections = sections,
            crosstab = Self::render_crosstab_section(&report.crosstab),
            incidents = Self::render_incidents_section(&report.incidents),
            quality = Self::render_quality_section(&report.summary),
        )
    }

    fn render_aggregate_section(aggregate: &Aggregate) -> String {
        let label = html_escape(aggregate.field.label());
        let chart = format!(
            r#"<img class="chart" src="{dir}/{file}" alt="{label} chart">"#,
            dir = CHARTS_DIR,
            file = chart_file(aggregate),
            label = label,
        );

        if aggregate.is_empty() {
            return format!(
                r#"        <section class="panel" id="{slug}">
            <h2>{label}</h2>
            {chart}
            <p class="no-data">No data</p>
        </section>
"#,
                slug = aggregate.field.slug(),
                label = label,
                chart = chart,
            );
        }

        let rows: String = aggregate
            .categories
            .iter()
            .map(|c| {
                format!(
                    "                <tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{:.1}%</td><td class=\"num\">{:.1}% - {:.1}%</td><td class=\"num\">{:.2}</td><td class=\"num\">{:.1}</td></tr>\n",
                    html_escape(&c.category),
                    c.count,
                    c.proportion * 100.0,
                    c.ci_low * 100.0,
                    c.ci_high * 100.0,
                    c.impact.mean,
                    c.impact.median,
                )
            })
            .collect();

        format!(
            r#"        <section class="panel" id="{slug}">
            <h2>{label}</h2>
            {chart}
            <table>
                <thead><tr><th>{label}</th><th>Count</th><th>Share</th><th>{ci:.0}% CI</th><th>Mean impact</th><th>Median impact</th></tr></thead>
                <tbody>
{rows}                </tbody>
            </table>
            <p class="note">{total} items from {records} incidents.</p>
        </section>
"#,
            slug = aggregate.field.slug(),
            label = label,
            chart = chart,
            ci = CONFIDENCE_LEVEL * 100.0,
            rows = rows,
            total = aggregate.total,
            records = aggregate.records,
        )
    }

    fn render_crosstab_section(tab: &CrossTab) -> String {
        if tab.is_empty() {
            return r#"        <section class="panel" id="domain-by-time">
            <h2>Technical domain by time point</h2>
            <p class="no-data">No data</p>
        </section>
"#
            .to_string();
        }

        let max = tab.max_count().max(1) as f64;
        let head: String = tab
            .time_points
            .iter()
            .map(|t| format!("<th>{}</th>", html_escape(t)))
            .collect();

        let mut rows = String::new();
        for domain in &tab.domains {
            let cells: String = tab
                .time_points
                .iter()
                .map(|t| match tab.cell(domain, t) {
                    Some(cell) => {
                        let specialties = cell
                            .specialties
                            .iter()
                            .map(|(s, n)| format!("{} ({})", s, n))
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!(
                            r#"<td class="num" style="background: rgba(37, 99, 235, {:.2})" title="{}">{}</td>"#,
                            0.1 + 0.6 * cell.count as f64 / max,
                            html_escape(&specialties),
                            cell.count
                        )
                    }
                    None => r#"<td class="num"></td>"#.to_string(),
                })
                .collect();
            rows.push_str(&format!(
                "                <tr><th>{}</th>{}<td class=\"num\">{}</td></tr>\n",
                html_escape(domain),
                cells,
                tab.domain_total(domain)
            ));
        }

        let totals: String = tab
            .time_points
            .iter()
            .map(|t| format!(r#"<td class="num">{}</td>"#, tab.time_point_total(t)))
            .collect();

        format!(
            r#"        <section class="panel" id="domain-by-time">
            <h2>Technical domain by time point</h2>
            <table class="grid">
                <thead><tr><th>Technical domain</th>{head}<th>Total</th></tr></thead>
                <tbody>
{rows}                <tr><th>Total</th>{totals}<td class="num">{total}</td></tr>
                </tbody>
            </table>
            <p class="note">Hover a cell for the clinical specialties involved.</p>
        </section>
"#,
            head = head,
            rows = rows,
            totals = totals,
            total = tab.total,
        )
    }

    fn render_incidents_section(incidents: &[Record]) -> String {
        if incidents.is_empty() {
            return String::new();
        }

        let rows: String = incidents
            .iter()
            .map(|r| {
                let title = match r.reference.link.as_deref().filter(|l| is_web_link(l)) {
                    Some(link) => format!(
                        r#"<a href="{}" rel="noopener">{}</a>"#,
                        html_escape(link),
                        html_escape(&r.incident)
                    ),
                    None => html_escape(&r.incident),
                };
                format!(
                    "                <tr id=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{}</td><td>{}</td></tr>\n",
                    html_escape(&r.id),
                    title,
                    html_escape(&r.specialties.join("; ")),
                    html_escape(&r.domain),
                    html_escape(r.time_point.display()),
                    html_escape(r.source.label()),
                    r.impact,
                    html_escape(&r.description),
                )
            })
            .collect();

        format!(
            r#"        <section class="panel" id="incidents">
            <h2>Incidents</h2>
            <table>
                <thead><tr><th>Incident</th><th>Specialty</th><th>Technical domain</th><th>Time</th><th>Source</th><th>Impact</th><th>Description</th></tr></thead>
                <tbody>
{rows}                </tbody>
            </table>
        </section>
"#,
            rows = rows,
        )
    }

    fn render_quality_section(summary: &RunSummary) -> String {
        let reasons: String = summary
            .rejections_by_reason
            .iter()
            .map(|(reason, n)| {
                format!(
                    "                <tr><td>{}</td><td class=\"num\">{}</td></tr>\n",
                    html_escape(reason),
                    n
                )
            })
            .collect();
        let warnings: String = summary
            .warnings_by_kind
            .iter()
            .map(|(kind, n)| {
                format!(
                    "                <tr><td>{}</td><td class=\"num\">{}</td></tr>\n",
                    html_escape(kind),
                    n
                )
            })
            .collect();
        let rejected: String = summary
            .rejections
            .iter()
            .map(|r| {
                format!(
                    "                <li>Row {} (line {}): {}</li>\n",
                    r.row,
                    r.line,
                    html_escape(&r.reason.to_string())
                )
            })
            .collect();

        format!(
            r#"        <section class="panel" id="data-quality">
            <h2>Data quality</h2>
            <p>{valid} valid rows, {rejected_n} rejected, {warn_n} warnings.</p>
            <table>
                <thead><tr><th>Rejection reason</th><th>Rows</th></tr></thead>
                <tbody>
{reasons}                </tbody>
            </table>
            <table>
                <thead><tr><th>Warning</th><th>Rows</th></tr></thead>
                <tbody>
{warnings}                </tbody>
            </table>
            <ul class="rejected">
{rejected}            </ul>
        </section>
"#,
            valid = summary.valid_rows,
            rejected_n = summary.rejected_rows,
            warn_n = summary.warnings.len(),
            reasons = reasons,
            warnings = warnings,
            rejected = rejected,
        )
    }
}

fn inline_css() -> &'static str {
    r#"
        :root { --ink: #111827; --muted: #6b7280; --accent: #2563eb; }
        html, body { margin: 0; padding: 0; background: #ffffff; color: var(--ink);
            font-family: Inter, system-ui, -apple-system, "Segoe UI", Roboto, Helvetica, Arial, sans-serif; line-height: 1.6; }
        .wrap { max-width: 1120px; margin: 0 auto; padding: 24px; }
        header { text-align: center; margin: 24px 0 18px; }
        h1 { font-weight: 800; font-size: clamp(28px, 5vw, 42px); letter-spacing: -0.02em; margin: 10px 0 6px; }
        .subtitle { color: var(--muted); }
        .badge { display: inline-block; padding: 6px 10px; border-radius: 999px; background: #eef2ff; color: #3730a3; font-size: 12px; border: 1px solid #c7d2fe; }
        .panel { border: 1px solid #e5e7eb; border-radius: 16px; padding: 18px; margin-top: 16px; }
        .chart { width: 100%; height: auto; }
        table { border-collapse: collapse; width: 100%; margin-top: 12px; }
        th, td { border-bottom: 1px solid #e5e7eb; padding: 6px 8px; text-align: left; }
        td.num { text-align: right; font-variant-numeric: tabular-nums; }
        .no-data, .note { color: var(--muted); }
        footer { color: var(--muted); font-size: 14px; margin: 32px 0 64px; }
    "#
}

/// Only plain web links are turned into anchors.
fn is_web_link(link: &str) -> bool {
    let lower = link.trim().to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
