//! Vocabulary Module
//! Case-insensitive normalization of categorical values against known terms.

use crate::data::record::{ALL_SPECIALTIES, UNKNOWN_DOMAIN};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VocabularyError {
    #[error("failed to read vocabulary file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid vocabulary file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("alias '{alias}' maps to both '{first}' and '{second}'")]
    ConflictingAlias {
        alias: String,
        first: String,
        second: String,
    },
}

/// Vocabulary for one field as written in the JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VocabularySpec {
    #[serde(default)]
    pub closed: bool,
    /// Canonical term -> aliases.
    #[serde(default)]
    pub terms: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct VocabularyFile {
    specialty: Option<VocabularySpec>,
    domain: Option<VocabularySpec>,
    time_point: Option<VocabularySpec>,
}

/// Comparison key: trimmed, inner whitespace collapsed, lowercased.
pub fn match_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Known terms of one categorical field.
///
/// A closed vocabulary only accepts its own terms and aliases. An open one
/// also accepts new values, collapsing spellings that differ only in case or
/// whitespace onto the first spelling seen.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    closed: bool,
    lookup: HashMap<String, String>,
}

impl Vocabulary {
    pub fn open() -> Self {
        Self {
            closed: false,
            lookup: HashMap::new(),
        }
    }

    pub fn from_spec(spec: &VocabularySpec) -> Result<Self, VocabularyError> {
        let mut vocab = Self {
            closed: spec.closed,
            lookup: HashMap::new(),
        };
        for (canonical, aliases) in &spec.terms {
            let canonical = canonical.split_whitespace().collect::<Vec<_>>().join(" ");
            vocab.add_alias(&canonical, &canonical)?;
            for alias in aliases {
                vocab.add_alias(alias, &canonical)?;
            }
        }
        Ok(vocab)
    }

    /// Register a term that is always accepted, even by a closed vocabulary.
    pub fn with_term(mut self, term: &str) -> Self {
        self.lookup
            .entry(match_key(term))
            .or_insert_with(|| term.to_string());
        self
    }

    fn add_alias(&mut self, alias: &str, canonical: &str) -> Result<(), VocabularyError> {
        let key = match_key(alias);
        match self.lookup.get(&key) {
            Some(existing) if existing != canonical => Err(VocabularyError::ConflictingAlias {
                alias: alias.to_string(),
                first: existing.clone(),
                second: canonical.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.lookup.insert(key, canonical.to_string());
                Ok(())
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Map a raw value onto its canonical term.
    ///
    /// Returns `None` for blank input and for values a closed vocabulary does
    /// not know.
    pub fn normalize(&mut self, raw: &str) -> Option<String> {
        let key = match_key(raw);
        if key.is_empty() {
            return None;
        }
        if let Some(canonical) = self.lookup.get(&key) {
            return Some(canonical.clone());
        }
        if self.closed {
            return None;
        }
        let spelling = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        self.lookup.insert(key, spelling.clone());
        Some(spelling)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::open()
    }
}

/// Vocabularies for every normalized categorical field.
#[derive(Debug, Clone)]
pub struct VocabularySet {
    pub specialty: Vocabulary,
    pub domain: Vocabulary,
    /// Time point labels outside the known time line.
    pub time_point: Vocabulary,
}

impl Default for VocabularySet {
    fn default() -> Self {
        Self {
            specialty: Vocabulary::open().with_term(ALL_SPECIALTIES),
            domain: Vocabulary::open().with_term(UNKNOWN_DOMAIN),
            time_point: Vocabulary::open(),
        }
    }
}

impl VocabularySet {
    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let content = fs::read_to_string(path).map_err(|source| VocabularyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, VocabularyError> {
        let file: VocabularyFile = serde_json::from_str(json)?;
        let build = |spec: Option<VocabularySpec>| -> Result<Vocabulary, VocabularyError> {
            spec.map(|s| Vocabulary::from_spec(&s))
                .transpose()
                .map(Option::unwrap_or_default)
        };
        Ok(Self {
            specialty: build(file.specialty)?.with_term(ALL_SPECIALTIES),
            domain: build(file.domain)?.with_term(UNKNOWN_DOMAIN),
            time_point: build(file.time_point)?,
        })
    }
}
