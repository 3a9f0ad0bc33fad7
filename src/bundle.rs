//! Release Bundle Module
//! Packs the generated artifacts and the source dataset into a ZIP archive.
//!
//! Entries are written in the given order with a fixed timestamp, so the same
//! files always produce the same archive bytes.

use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write bundle: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Writes release bundles.
pub struct BundleWriter;

impl BundleWriter {
    fn options() -> FileOptions {
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644)
    }

    /// Write `entries` (archive name, source file) to a ZIP file at `output_path`.
    pub fn write(output_path: &Path, entries: &[(String, PathBuf)]) -> Result<(), BundleError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(output_path)?;
        Self::write_to(file, entries)?;
        info!(
            "Wrote bundle {} ({} entries)",
            output_path.display(),
            entries.len()
        );
        Ok(())
    }

    /// Write the archive to any seekable writer.
    pub fn write_to<W: Write + Seek>(
        writer: W,
        entries: &[(String, PathBuf)],
    ) -> Result<W, BundleError> {
        let mut zip = ZipWriter::new(writer);
        let options = Self::options();

        for (name, path) in entries {
            let bytes = fs::read(path).map_err(|source| BundleError::Read {
                path: path.clone(),
                source,
            })?;
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&bytes)?;
        }

        Ok(zip.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn fixture(temp: &TempDir) -> Vec<(String, PathBuf)> {
        let a = temp.path().join("index.html");
        let b = temp.path().join("data.csv");
        fs::write(&a, "<html></html>").unwrap();
        fs::write(&b, "Short Title\nA\n").unwrap();
        vec![
            ("index.html".to_string(), a),
            ("data/data.csv".to_string(), b),
        ]
    }

    #[test]
    fn test_bundle_contains_entries_in_order() {
        let temp = TempDir::new().unwrap();
        let entries = fixture(&temp);
        let out = temp.path().join("release/cipher.zip");
        BundleWriter::write(&out, &entries).unwrap();

        let mut archive = ZipArchive::new(File::open(&out).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "index.html");

        let mut content = String::new();
        archive
            .by_name("data/data.csv")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "Short Title\nA\n");
    }

    #[test]
    fn test_bundle_bytes_are_reproducible() {
        let temp = TempDir::new().unwrap();
        let entries = fixture(&temp);
        let first = BundleWriter::write_to(Cursor::new(Vec::new()), &entries)
            .unwrap()
            .into_inner();
        let second = BundleWriter::write_to(Cursor::new(Vec::new()), &entries)
            .unwrap()
            .into_inner();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_entry_is_reported() {
        let temp = TempDir::new().unwrap();
        let entries = vec![("x".to_string(), temp.path().join("missing"))];
        let err = BundleWriter::write_to(Cursor::new(Vec::new()), &entries).unwrap_err();
        assert!(matches!(err, BundleError::Read { .. }));
    }
}
