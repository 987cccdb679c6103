use log::debug;

use crate::config::{GitHubConfig, StoreConfig, StoreKind};
use crate::document::BenchmarkData;
use crate::error::Result;

use super::codec::DataFormat;
use super::file::FileStore;
use super::github::GitHubStore;

/// Token identifying the document version a snapshot was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Version {
    /// Nothing persisted yet
    Missing,
    /// Exact file contents, for the local backend
    Content(String),
    /// Git blob sha, for the GitHub backend
    Blob(String),
}

/// A document as read from a backend, with the version a conditional write
/// must match.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub data: Option<BenchmarkData>,
    pub format: DataFormat,
    pub version: Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed,
    /// Somebody else wrote since the snapshot was taken
    Conflict,
}

/// Where the benchmark document is persisted.
pub enum Backend {
    File(FileStore),
    GitHub(GitHubStore),
}

impl Backend {
    /// Builds the backend selected in the store configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the GitHub backend is selected without a
    /// repository or its HTTP client cannot be built.
    pub fn from_config(store: &StoreConfig, github: &GitHubConfig) -> Result<Self> {
        let backend = match store.backend {
            StoreKind::File => Backend::File(FileStore::new(&store.data_file)),
            StoreKind::GitHub => Backend::GitHub(GitHubStore::from_config(github)?),
        };
        debug!("Using {} backend", backend.describe());
        Ok(backend)
    }

    pub async fn read(&self) -> Result<Snapshot> {
        match self {
            Backend::File(store) => store.read(),
            Backend::GitHub(store) => store.read().await,
        }
    }

    /// Replaces the whole document if it is still at `expected`.
    pub async fn write(
        &self,
        expected: &Version,
        data: &BenchmarkData,
        format: DataFormat,
        message: &str,
    ) -> Result<WriteOutcome> {
        match self {
            Backend::File(store) => store.write(expected, data, format),
            Backend::GitHub(store) => store.write(expected, data, format, message).await,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Backend::File(store) => format!("file {}", store.path().display()),
            Backend::GitHub(store) => store.describe(),
        }
    }
}
