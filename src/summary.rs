//! End-of-run summary: valid vs rejected rows and why.

use crate::data::{CleanOutput, DataQualityWarning, Rejection};
use crate::stats::{Aggregate, GroupField};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// File name of the input dataset.
    pub input: String,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub rejected_rows: usize,
    pub rejections_by_reason: BTreeMap<String, usize>,
    pub warnings_by_kind: BTreeMap<String, usize>,
    /// Fields whose aggregate had no categories and were rendered as "no data".
    pub empty_aggregates: Vec<GroupField>,
    pub rejections: Vec<Rejection>,
    pub warnings: Vec<DataQualityWarning>,
}

impl RunSummary {
    pub fn new(input: &str, cleaned: &CleanOutput) -> Self {
        let owned_keys = |m: BTreeMap<&'static str, usize>| -> BTreeMap<String, usize> {
            m.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
        };
        Self {
            input: input.to_string(),
            total_rows: cleaned.total_rows,
            valid_rows: cleaned.records.len(),
            rejected_rows: cleaned.rejections.len(),
            rejections_by_reason: owned_keys(cleaned.rejection_counts()),
            warnings_by_kind: owned_keys(cleaned.warning_counts()),
            empty_aggregates: Vec::new(),
            rejections: cleaned.rejections.clone(),
            warnings: cleaned.warnings.clone(),
        }
    }

    pub fn record_empty_aggregates(&mut self, aggregates: &[Aggregate]) {
        self.empty_aggregates = aggregates
            .iter()
            .filter(|a| a.is_empty())
            .map(|a| a.field)
            .collect();
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input:    {}", self.input)?;
        writeln!(f, "Rows:     {}", self.total_rows)?;
        writeln!(f, "Valid:    {}", self.valid_rows)?;
        writeln!(f, "Rejected: {}", self.rejected_rows)?;
        for (reason, n) in &self.rejections_by_reason {
            writeln!(f, "  {:<24} {}", reason, n)?;
        }
        if !self.warnings_by_kind.is_empty() {
            writeln!(f, "Warnings: {}", self.warnings.len())?;
            for (kind, n) in &self.warnings_by_kind {
                writeln!(f, "  {:<24} {}", kind, n)?;
            }
        }
        for field in &self.empty_aggregates {
            writeln!(f, "No data for {}", field)?;
        }
        Ok(())
    }
}
