use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::document::BenchmarkData;
use crate::error::Result;

use super::backend::{Snapshot, Version, WriteOutcome};
use super::codec::{decode, encode, DataFormat};

/// Benchmark document kept in a local file, e.g. a checked out `gh-pages`
/// worktree.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers see either the old or the new document.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Snapshot> {
        let Some(text) = self.read_text()? else {
            debug!("No benchmark data at {}", self.path.display());
            return Ok(Snapshot {
                data: None,
                format: DataFormat::for_path(&self.path),
                version: Version::Missing,
            });
        };

        let (data, format) = decode(&text)?;
        debug!(
            "Loaded {} suites from {}",
            data.entries.len(),
            self.path.display()
        );

        Ok(Snapshot {
            data: Some(data),
            format,
            version: Version::Content(text),
        })
    }

    /// Replaces the file if its contents still match `expected`.
    ///
    /// The compare and the rename are separate steps, so two writers racing
    /// within that window can still clobber each other. The GitHub backend's
    /// conditional update has no such window.
    pub fn write(
        &self,
        expected: &Version,
        data: &BenchmarkData,
        format: DataFormat,
    ) -> Result<WriteOutcome> {
        let current = match self.read_text()? {
            Some(text) => Version::Content(text),
            None => Version::Missing,
        };
        if &current != expected {
            debug!("{} changed since it was read", self.path.display());
            return Ok(WriteOutcome::Conflict);
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(encode(data, format)?.as_bytes())?;
        temp.as_file().sync_all()?;

        if *expected == Version::Missing {
            // Fails if another writer created the file in the meantime
            if temp.persist_noclobber(&self.path).is_err() {
                return Ok(WriteOutcome::Conflict);
            }
        } else {
            temp.persist(&self.path).map_err(|e| e.error)?;
        }

        info!("Benchmark data written to: {}", self.path.display());
        Ok(WriteOutcome::Committed)
    }

    fn read_text(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::{entry, rate};
    use crate::error::BenchError;
    use crate::store::AppendMode;
    use tempfile::TempDir;

    fn document() -> BenchmarkData {
        BenchmarkData::new("https://github.com/acme/widgets")
            .append(
                "Benchmark",
                entry(1, "2025-05-08T20:23:11+03:00", vec![rate("q", 10.0)]),
                AppendMode::Merge,
            )
            .unwrap()
    }

    #[test]
    fn test_missing_file_reads_as_empty_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("dev/bench/data.js"));

        let snapshot = store.read().unwrap();
        assert!(snapshot.data.is_none());
        assert_eq!(snapshot.version, Version::Missing);
        assert_eq!(snapshot.format, DataFormat::Script);
    }

    #[test]
    fn test_write_creates_parent_dirs_and_reads_back() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("dev/bench/data.js"));

        let outcome = store
            .write(&Version::Missing, &document(), DataFormat::Script)
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Committed);

        let snapshot = store.read().unwrap();
        assert_eq!(snapshot.data, Some(document()));
        assert!(matches!(snapshot.version, Version::Content(_)));
    }

    #[test]
    fn test_stale_version_is_a_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("data.json"));
        store
            .write(&Version::Missing, &document(), DataFormat::Json)
            .unwrap();

        // Created by someone else after we saw nothing
        let outcome = store
            .write(&Version::Missing, &BenchmarkData::default(), DataFormat::Json)
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict);

        let stale = Version::Content("{}".to_string());
        let outcome = store
            .write(&stale, &BenchmarkData::default(), DataFormat::Json)
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict);

        // Untouched by the rejected writes
        assert_eq!(store.read().unwrap().data, Some(document()));
    }

    #[test]
    fn test_corrupt_file_is_reported_not_repaired() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.json");
        fs::write(&path, "{\"lastUpdate\": \"soon\"}").unwrap();

        let err = FileStore::new(&path).read().unwrap_err();
        assert!(matches!(err, BenchError::StoreCorruption(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"lastUpdate\": \"soon\"}");
    }
}
