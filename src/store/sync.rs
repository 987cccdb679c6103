use std::time::Duration;

use log::{info, warn};

use crate::document::BenchmarkData;
use crate::error::{BenchError, Result};

use super::backend::{Backend, WriteOutcome};

const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Read-compute-write cycle with optimistic concurrency.
///
/// Reads the current document, applies `update` to it and writes the result
/// conditionally on the version that was read. A conflicting write restarts
/// the whole cycle from a fresh read, up to `max_attempts` times. The
/// document is replaced as a whole, so an aborted run leaves the previous
/// version in place.
///
/// # Arguments
///
/// * `backend` - Where the document lives
/// * `max_attempts` - Upper bound on read-compute-write cycles
/// * `repo_url` - Repository URL used when no document exists yet
/// * `message` - Commit message for backends that record one
/// * `update` - Pure transformation from the current to the next document
///
/// # Errors
///
/// [`BenchError::MergeConflict`] once every attempt lost a race, or the
/// first error from reading, `update` or writing.
pub async fn commit_with_retry<F>(
    backend: &Backend,
    max_attempts: usize,
    repo_url: &str,
    message: &str,
    mut update: F,
) -> Result<BenchmarkData>
where
    F: FnMut(BenchmarkData) -> Result<BenchmarkData>,
{
    for attempt in 1..=max_attempts {
        let snapshot = backend.read().await?;
        let current = snapshot
            .data
            .unwrap_or_else(|| BenchmarkData::new(repo_url));
        let next = update(current)?;

        match backend
            .write(&snapshot.version, &next, snapshot.format, message)
            .await?
        {
            WriteOutcome::Committed => {
                info!(
                    "Committed benchmark data to {} (attempt {attempt}/{max_attempts})",
                    backend.describe()
                );
                return Ok(next);
            }
            WriteOutcome::Conflict => {
                warn!(
                    "Benchmark data changed while updating (attempt {attempt}/{max_attempts}), retrying"
                );
                if attempt < max_attempts {
                    tokio::time::sleep(RETRY_DELAY * u32::try_from(attempt).unwrap_or(u32::MAX))
                        .await;
                }
            }
        }
    }

    Err(BenchError::MergeConflict {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::{entry, rate};
    use crate::store::file::FileStore;
    use crate::store::{encode, AppendMode, DataFormat};
    use std::fs;
    use tempfile::TempDir;

    const SUITE: &str = "Benchmark";

    fn other_writer_document(seed: u8) -> String {
        let data = BenchmarkData::new("https://github.com/acme/widgets")
            .append(
                SUITE,
                entry(seed, "2025-05-01T00:00:00Z", vec![rate("q", 5.0)]),
                AppendMode::Merge,
            )
            .unwrap();
        encode(&data, DataFormat::Json).unwrap()
    }

    #[test]
    fn test_first_write_creates_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.json");
        let backend = Backend::File(FileStore::new(&path));
        let ours = entry(1, "2025-05-08T20:23:11+03:00", vec![rate("q", 10.0)]);

        let data = tokio_test::block_on(commit_with_retry(
            &backend,
            3,
            "https://github.com/acme/widgets",
            "add result",
            |current| current.append(SUITE, ours.clone(), AppendMode::Merge),
        ))
        .unwrap();

        assert_eq!(data.repo_url, "https://github.com/acme/widgets");
        assert_eq!(data.load(SUITE).len(), 1);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_conflict_rereads_and_keeps_both_writers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.json");
        let backend = Backend::File(FileStore::new(&path));
        let ours = entry(1, "2025-05-08T20:23:11+03:00", vec![rate("q", 10.0)]);

        let mut calls = 0;
        let data = commit_with_retry(&backend, 3, "", "add result", |current| {
            calls += 1;
            if calls == 1 {
                // Another job lands its result between our read and write
                fs::write(&path, other_writer_document(9)).unwrap();
            }
            current.append(SUITE, ours.clone(), AppendMode::Merge)
        })
        .await
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(data.load(SUITE).len(), 2);

        let on_disk = FileStore::new(&path).read().unwrap().data.unwrap();
        assert_eq!(on_disk, data);
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_attempts() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.json");
        let backend = Backend::File(FileStore::new(&path));
        let ours = entry(1, "2025-05-08T20:23:11+03:00", vec![rate("q", 10.0)]);

        let mut calls: u8 = 0;
        let err = commit_with_retry(&backend, 2, "", "add result", |current| {
            calls += 1;
            fs::write(&path, other_writer_document(100 + calls)).unwrap();
            current.append(SUITE, ours.clone(), AppendMode::Merge)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, BenchError::MergeConflict { attempts: 2 }));
        // Only the other writers' documents ever reached the disk
        let on_disk = FileStore::new(&path).read().unwrap().data.unwrap();
        assert!(on_disk.load(SUITE).position(ours.id()).is_none());
    }

    #[tokio::test]
    async fn test_update_error_aborts_without_writing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.json");
        let backend = Backend::File(FileStore::new(&path));
        let mut bad = entry(1, "2025-05-08T20:23:11+03:00", vec![]);
        bad.tool = String::new();

        let err = commit_with_retry(&backend, 3, "", "add result", |current| {
            current.append(SUITE, bad.clone(), AppendMode::Merge)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, BenchError::InvalidEntry(_)));
        assert!(!path.exists());
    }
}
