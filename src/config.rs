//! Build configuration resolved from the command line.

use crate::data::VocabularySet;
use crate::stats::GroupField;
use std::path::PathBuf;

pub const DEFAULT_INPUT: &str = "data/v1_cipherdata_latest.csv";
pub const DEFAULT_OUT_DIR: &str = ".";
pub const DEFAULT_TITLE: &str = "CIPHER: Patient Harm During Hospital Cyberattacks";

/// Resolved settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    /// Fields to aggregate, in page order, without duplicates.
    pub fields: Vec<GroupField>,
    pub title: String,
    pub vocabularies: VocabularySet,
    pub bundle: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            fields: vec![GroupField::Specialty],
            title: DEFAULT_TITLE.to_string(),
            vocabularies: VocabularySet::default(),
            bundle: None,
        }
    }
}

impl BuildConfig {
    pub fn new(input: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            out_dir: out_dir.into(),
            ..Default::default()
        }
    }

    /// Set the aggregated fields; duplicates keep their first position.
    /// An empty list falls back to the clinical specialty.
    pub fn with_fields(mut self, fields: &[GroupField]) -> Self {
        let mut unique = Vec::with_capacity(fields.len());
        for &field in fields {
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        if unique.is_empty() {
            unique.push(GroupField::Specialty);
        }
        self.fields = unique;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_bundle(mut self, bundle: Option<PathBuf>) -> Self {
        self.bundle = bundle;
        self
    }

    pub fn with_vocabularies(mut self, vocabularies: VocabularySet) -> Self {
        self.vocabularies = vocabularies;
        self
    }

    /// File name of the input, used in reports and bundle paths.
    pub fn input_name(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }
}
