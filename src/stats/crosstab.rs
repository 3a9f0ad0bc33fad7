//! Cross Tabulation Module
//! Places every incident on the technical domain x time point grid.
//!
//! Domains are listed by name. Time points follow the attack time line
//! (hour 0 to month 1, then unknown) and free-text labels come last, by name.
//! Each cell also breaks its incidents down by clinical specialty.

use crate::data::Record;
use crate::stats::AggregateError;
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Incidents sharing one technical domain and one time point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossTabCell {
    pub domain: String,
    pub time_point: String,
    pub count: usize,
    pub mean_impact: f64,
    /// (specialty, incidents) pairs, most frequent first.
    pub specialties: Vec<(String, usize)>,
}

/// Domain x time point counts for the whole dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrossTab {
    pub domains: Vec<String>,
    pub time_points: Vec<String>,
    /// Non-empty cells, row by row in axis order.
    pub cells: Vec<CrossTabCell>,
    pub total: usize,
}

impl CrossTab {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, domain: &str, time_point: &str) -> Option<&CrossTabCell> {
        self.cells
            .iter()
            .find(|c| c.domain == domain && c.time_point == time_point)
    }

    pub fn max_count(&self) -> usize {
        self.cells.iter().map(|c| c.count).max().unwrap_or(0)
    }

    pub fn domain_total(&self, domain: &str) -> usize {
        self.cells
            .iter()
            .filter(|c| c.domain == domain)
            .map(|c| c.count)
            .sum()
    }

    pub fn time_point_total(&self, time_point: &str) -> usize {
        self.cells
            .iter()
            .filter(|c| c.time_point == time_point)
            .map(|c| c.count)
            .sum()
    }
}

fn strings(df: &DataFrame, name: &str) -> PolarsResult<Vec<String>> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

fn counts(df: &DataFrame, name: &str) -> PolarsResult<Vec<usize>> {
    let column = df.column(name)?.cast(&DataType::UInt64)?;
    let values = column.u64()?.into_iter().map(|v| v.unwrap_or(0) as usize).collect();
    Ok(values)
}

fn floats(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    let values = column.f64()?.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    Ok(values)
}

/// Builds the domain x time point grid.
pub struct CrossTabulator;

impl CrossTabulator {
    pub fn build(records: &[Record]) -> Result<CrossTab, AggregateError> {
        if records.is_empty() {
            return Ok(CrossTab::default());
        }

        let domains: Vec<String> = records
            .iter()
            .map(|r| r.domain.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let time_points: Vec<String> = records
            .iter()
            .map(|r| (r.time_point.rank(), r.time_point.display().to_string()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|(_, label)| label)
            .collect();

        let df = DataFrame::new(vec![
            Column::new(
                "domain".into(),
                records.iter().map(|r| r.domain.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                "time_point".into(),
                records
                    .iter()
                    .map(|r| r.time_point.display())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "impact".into(),
                records.iter().map(|r| r.impact).collect::<Vec<_>>(),
            ),
        ])?;
        let grouped = df
            .lazy()
            .group_by([col("domain"), col("time_point")])
            .agg([
                len().alias("count"),
                col("impact").mean().alias("mean_impact"),
            ])
            .collect()?;

        let mut cell_stats: HashMap<(String, String), (usize, f64)> = HashMap::new();
        for (((domain, time_point), count), mean) in strings(&grouped, "domain")?
            .into_iter()
            .zip(strings(&grouped, "time_point")?)
            .zip(counts(&grouped, "count")?)
            .zip(floats(&grouped, "mean_impact")?)
        {
            cell_stats.insert((domain, time_point), (count, mean));
        }

        let (mut by_domain, mut by_time, mut by_specialty) = (Vec::new(), Vec::new(), Vec::new());
        for record in records {
            for specialty in &record.specialties {
                by_domain.push(record.domain.as_str());
                by_time.push(record.time_point.display());
                by_specialty.push(specialty.as_str());
            }
        }
        let exploded = DataFrame::new(vec![
            Column::new("domain".into(), by_domain),
            Column::new("time_point".into(), by_time),
            Column::new("specialty".into(), by_specialty),
        ])?;
        let grouped = exploded
            .lazy()
            .group_by([col("domain"), col("time_point"), col("specialty")])
            .agg([len().alias("count")])
            .collect()?;

        let mut cell_specialties: HashMap<(String, String), Vec<(String, usize)>> = HashMap::new();
        for (((domain, time_point), specialty), count) in strings(&grouped, "domain")?
            .into_iter()
            .zip(strings(&grouped, "time_point")?)
            .zip(strings(&grouped, "specialty")?)
            .zip(counts(&grouped, "count")?)
        {
            cell_specialties
                .entry((domain, time_point))
                .or_default()
                .push((specialty, count));
        }

        let mut cells = Vec::new();
        for domain in &domains {
            for time_point in &time_points {
                let key = (domain.clone(), time_point.clone());
                let Some(&(count, mean_impact)) = cell_stats.get(&key) else {
                    continue;
                };
                let mut specialties = cell_specialties.remove(&key).unwrap_or_default();
                specialties.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                cells.push(CrossTabCell {
                    domain: domain.clone(),
                    time_point: time_point.clone(),
                    count,
                    mean_impact,
                    specialties,
                });
            }
        }

        debug!(
            "Cross-tabulated {} incidents: {} domains x {} time points, {} cells",
            records.len(),
            domains.len(),
            time_points.len(),
            cells.len()
        );

        Ok(CrossTab {
            domains,
            time_points,
            cells,
            total: records.len(),
        })
    }
}
