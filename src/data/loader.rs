//! CSV Data Loader Module
//! Reads the dataset into raw rows and enforces the structural rules of the file.

use crate::data::record::Column;
use csv::{ErrorKind, ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
    #[error("missing header row")]
    MissingHeader,
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount { line: u64, expected: u64, found: u64 },
    #[error("line {line}: invalid UTF-8")]
    InvalidUtf8 { line: u64 },
    #[error("missing required column '{0}'")]
    MissingColumn(Column),
    #[error("malformed CSV: {0}")]
    Csv(String),
}

/// One data row as read from the file, fields untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based position among data rows.
    pub position: usize,
    /// Line number in the source file.
    pub line: u64,
    pub fields: Vec<String>,
}

/// Header plus data rows of a loaded CSV file.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub origin: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    columns: HashMap<Column, usize>,
}

impl RawTable {
    /// Raw value of a logical column for a row, if the column exists.
    pub fn value<'a>(&self, row: &'a RawRow, column: Column) -> Option<&'a str> {
        self.columns
            .get(&column)
            .and_then(|&idx| row.fields.get(idx))
            .map(String::as_str)
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains_key(&column)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Handles CSV file loading.
pub struct DataLoader;

impl DataLoader {
    /// Load a CSV file from disk.
    pub fn load_csv(path: &Path) -> Result<RawTable, LoaderError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoaderError::NotFound(path.to_path_buf()),
            _ => LoaderError::Io(e),
        })?;
        let table = Self::from_reader(file, path)?;
        info!(
            "Loaded {} rows ({} columns) from {}",
            table.row_count(),
            table.headers.len(),
            path.display()
        );
        Ok(table)
    }

    /// Load CSV content from any reader. `origin` is kept for reporting only.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<RawTable, LoaderError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(Self::classify)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(LoaderError::MissingHeader);
        }

        let columns = Self::resolve_columns(&headers)?;

        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => {
                    let line = record.position().map(|p| p.line()).unwrap_or(0);
                    rows.push(RawRow {
                        position: rows.len() + 1,
                        line,
                        fields: record.iter().map(str::to_string).collect(),
                    });
                }
                Ok(false) => break,
                Err(e) => return Err(Self::classify(e)),
            }
        }
        debug!("Read {} data rows", rows.len());

        Ok(RawTable {
            origin: origin.to_path_buf(),
            headers,
            rows,
            columns,
        })
    }

    fn resolve_columns(headers: &[String]) -> Result<HashMap<Column, usize>, LoaderError> {
        let mut columns = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(col) = Column::from_header(header) {
                // First occurrence wins for duplicated headers
                columns.entry(col).or_insert(idx);
            }
        }

        if let Some(missing) = Column::ALL
            .into_iter()
            .find(|c| c.is_required_column() && !columns.contains_key(c))
        {
            return Err(LoaderError::MissingColumn(missing));
        }
        Ok(columns)
    }

    fn classify(err: csv::Error) -> LoaderError {
        match err.into_kind() {
            ErrorKind::UnequalLengths {
                pos,
                expected_len,
                len,
            } => LoaderError::FieldCount {
                line: pos.map(|p| p.line()).unwrap_or(0),
                expected: expected_len,
                found: len,
            },
            ErrorKind::Utf8 { pos, .. } => LoaderError::InvalidUtf8 {
                line: pos.map(|p| p.line()).unwrap_or(0),
            },
            ErrorKind::Io(e) => LoaderError::Io(e),
            other => LoaderError::Csv(format!("{:?}", other)),
        }
    }
}
