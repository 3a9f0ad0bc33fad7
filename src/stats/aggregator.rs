//! Aggregator Module
//! Groups records by a categorical field and counts them.
//!
//! Categories are ordered by descending count, ties broken by category name,
//! so the same records always produce the same aggregate.

use crate::data::Record;
use crate::stats::calculator::{ImpactStats, StatsCalculator, CONFIDENCE_LEVEL};
use clap::ValueEnum;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Categorical field to group records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GroupField {
    /// Clinical specialty (clinical domain); multi-specialty rows count once per specialty
    Specialty,
    /// Technical domain affected by the attack
    Domain,
    /// Time point after the attack
    TimePoint,
    /// Academic literature or social media
    Source,
}

impl GroupField {
    pub fn label(self) -> &'static str {
        match self {
            GroupField::Specialty => "Clinical Specialty",
            GroupField::Domain => "Technical Domain",
            GroupField::TimePoint => "Time Point",
            GroupField::Source => "Source",
        }
    }

    /// File-name friendly identifier.
    pub fn slug(self) -> &'static str {
        match self {
            GroupField::Specialty => "specialty",
            GroupField::Domain => "domain",
            GroupField::TimePoint => "time-point",
            GroupField::Source => "source",
        }
    }

    /// Category keys a record contributes to this field.
    pub fn keys(self, record: &Record) -> Vec<String> {
        match self {
            GroupField::Specialty => record.specialties.clone(),
            GroupField::Domain => vec![record.domain.clone()],
            GroupField::TimePoint => vec![record.time_point.display().to_string()],
            GroupField::Source => vec![record.source.label().to_string()],
        }
    }
}

impl fmt::Display for GroupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Count and derived statistics of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
    pub proportion: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub impact: ImpactStats,
}

/// Grouped summary of the records for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub field: GroupField,
    /// Number of records the aggregate was built from.
    pub records: usize,
    /// Number of counted items (differs from `records` for multi-valued fields).
    pub total: usize,
    pub categories: Vec<CategoryCount>,
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, category: &str) -> Option<&CategoryCount> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// (category, count) pairs in aggregate order.
    pub fn counts(&self) -> Vec<(&str, usize)> {
        self.categories
            .iter()
            .map(|c| (c.category.as_str(), c.count))
            .collect()
    }
}

/// Builds aggregates from cleaned records.
pub struct Aggregator;

impl Aggregator {
    /// Group records by one field.
    pub fn aggregate(records: &[Record], field: GroupField) -> Result<Aggregate, AggregateError> {
        let (keys, impacts): (Vec<String>, Vec<f64>) = records
            .iter()
            .flat_map(|r| field.keys(r).into_iter().map(move |k| (k, r.impact)))
            .unzip();
        let total = keys.len();

        if total == 0 {
            warn!("Empty aggregate for {}: no data to chart", field);
            return Ok(Aggregate {
                field,
                records: records.len(),
                total,
                categories: Vec::new(),
            });
        }

        let df = DataFrame::new(vec![
            Column::new("category".into(), keys),
            Column::new("impact".into(), impacts),
        ])?;

        let grouped = df
            .clone()
            .lazy()
            .group_by([col("category")])
            .agg([len().alias("count")])
            .collect()?;

        let categories = grouped.column("category")?.str()?;
        let counts = grouped.column("count")?.cast(&DataType::UInt64)?;
        let counts = counts.u64()?;

        let mut pairs: Vec<(String, usize)> = categories
            .into_iter()
            .zip(counts.into_iter())
            .filter_map(|(cat, n)| Some((cat?.to_string(), n? as usize)))
            .collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let z = StatsCalculator::z_score(CONFIDENCE_LEVEL);
        let categories: Vec<CategoryCount> = pairs
            .into_iter()
            .map(|(category, count)| {
                let values = StatsCalculator::get_values_for_category(&df, &category);
                let (ci_low, ci_high) = StatsCalculator::wilson_interval(count, total, z);
                CategoryCount {
                    impact: StatsCalculator::compute_descriptive_stats(&values),
                    proportion: count as f64 / total as f64,
                    ci_low,
                    ci_high,
                    category,
                    count,
                }
            })
            .collect();

        debug!(
            "Aggregated {} by {}: {} categories",
            total,
            field,
            categories.len()
        );

        Ok(Aggregate {
            field,
            records: records.len(),
            total,
            categories,
        })
    }

    /// Aggregate several fields in parallel, keeping the requested order.
    pub fn aggregate_all(
        records: &[Record],
        fields: &[GroupField],
    ) -> Result<Vec<Aggregate>, AggregateError> {
        fields
            .par_iter()
            .map(|&field| Self::aggregate(records, field))
            .collect()
    }
}
