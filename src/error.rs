use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Unsupported benchmark tool: {0}")]
    UnsupportedTool(String),

    #[error("Malformed {tool} output: {reason}")]
    MalformedOutput { tool: String, reason: String },

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error(
        "Commit {commit} is older than every entry in suite '{suite}' and strict append mode is on"
    )]
    NonMonotonicRejected { suite: String, commit: String },

    #[error("Benchmark data was modified concurrently; gave up after {attempts} attempts")]
    MergeConflict { attempts: usize },

    #[error("Benchmark data is corrupt: {0}")]
    StoreCorruption(String),

    #[error("Benchmark harness failed: {0}")]
    Harness(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    pub fn malformed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
