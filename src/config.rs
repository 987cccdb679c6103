use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::BenchError;
use crate::ingest::ToolKind;
use crate::store::AppendMode;

/// Configuration file structure for benchkeeper.
///
/// Lets a repository keep its regression thresholds and storage location
/// next to its CI workflow instead of repeating them as flags.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Regression detection parameters
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Harness output interpretation
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Where and how the history is persisted
    #[serde(default)]
    pub store: StoreConfig,

    /// GitHub contents API backend
    #[serde(default)]
    pub github: GitHubConfig,

    /// Report preferences
    #[serde(default)]
    pub output: OutputConfig,
}

/// Regression thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DetectorConfig {
    /// Relative change that counts as a regression (2.0 = 200%)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// How many preceding entries form the baseline
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Exit with a failure status when a regression is found
    #[serde(default)]
    pub fail_on_alert: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IngestConfig {
    /// Harness that produced the output (e.g. 'cargo', 'pytest')
    pub tool: Option<String>,

    /// Suite the results are recorded under
    #[serde(default = "default_suite")]
    pub suite: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    GitHub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Persistence backend
    #[serde(default)]
    pub backend: StoreKind,

    /// Document path for the file backend
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    /// Repository URL recorded in a new document
    pub repo_url: Option<String>,

    /// Read-compute-write cycles before giving up on concurrent writers
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Out-of-order commit policy
    #[serde(default)]
    pub append_mode: AppendMode,

    /// Persist the updated document (disable for dry runs)
    #[serde(default = "default_true")]
    pub save: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Repository holding the document (e.g., 'owner/repo')
    pub repo: Option<String>,

    /// Branch holding the document
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Document path inside the branch
    #[serde(default = "default_github_path")]
    pub path: String,

    /// Token allowed to push to the branch
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Report printed to stdout
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,

    /// File receiving the alert report for an external reporter
    pub alerts_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
    Markdown,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            window_size: default_window_size(),
            fail_on_alert: false,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            tool: None,
            suite: default_suite(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreKind::File,
            data_file: default_data_file(),
            repo_url: None,
            max_retries: default_max_retries(),
            append_mode: AppendMode::Merge,
            save: true,
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            repo: None,
            branch: default_branch(),
            path: default_github_path(),
            token: None,
        }
    }
}

fn default_threshold() -> f64 {
    2.0
}

fn default_window_size() -> usize {
    1
}

fn default_suite() -> String {
    "Benchmark".to_string()
}

fn default_data_file() -> PathBuf {
    PathBuf::from("dev/bench/data.js")
}

fn default_max_retries() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_branch() -> String {
    "gh-pages".to_string()
}

fn default_github_path() -> String {
    "dev/bench/data.js".to_string()
}

const CANDIDATES: [&str; 4] = [
    "benchkeeper.toml",
    "benchkeeper.json",
    "benchkeeper.yaml",
    "benchkeeper.yml",
];

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./benchkeeper.toml
    /// 3. ./benchkeeper.json
    /// 4. ./benchkeeper.yaml
    /// 5. ./benchkeeper.yml
    /// 6. `<user config dir>/benchkeeper/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        for candidate in &CANDIDATES {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        let user_config =
            dirs::config_dir().map(|dir| dir.join("benchkeeper").join("config.toml"));
        if let Some(user_config) = user_config {
            if user_config.exists() {
                return Self::load_from_path(&user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Rejects settings the detector or store cannot work with.
    pub fn validate(&self) -> std::result::Result<(), BenchError> {
        let threshold = self.detector.threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(BenchError::Config(format!(
                "threshold must be a positive number, got {threshold}"
            )));
        }
        if self.detector.window_size == 0 {
            return Err(BenchError::Config("window-size must be at least 1".into()));
        }
        if self.store.max_retries == 0 {
            return Err(BenchError::Config("max-retries must be at least 1".into()));
        }
        if let Some(tool) = &self.ingest.tool {
            tool.parse::<ToolKind>()?;
        }
        if self.ingest.suite.trim().is_empty() {
            return Err(BenchError::Config("suite name must not be empty".into()));
        }
        Ok(())
    }
}
