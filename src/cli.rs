use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use url::Url;

use crate::commit::{self, ManualCommit};
use crate::config::{Config, OutputFormat, StoreKind};
use crate::detector::{self, Alert, Comparison};
use crate::document::{BenchmarkData, Commit, Entry};
use crate::harness::{self, HarnessSource};
use crate::ingest::{self, ToolKind};
use crate::output::{
    export_report, print_suites, print_summary, write_report_file, AlertReport, PhaseProgress,
    ReportFormat, RunSummary,
};
use crate::store::{commit_with_retry, decode, encode, AppendMode, Backend, DataFormat};

#[derive(Parser)]
#[command(name = "benchkeeper")]
#[command(author, version, about = "Continuous benchmark history and regression alerts", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./benchkeeper.toml, .json, .yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a benchmark run and check it for regressions
    Run(Box<RunArgs>),
    /// Merge two benchmark documents into one
    Merge {
        left: PathBuf,
        right: PathBuf,

        /// Destination (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a benchmark document and list its suites
    Check { file: PathBuf },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Harness that produced the output
    #[arg(
        short,
        long,
        value_parser = PossibleValuesParser::new(ToolKind::ALL.map(ToolKind::as_str))
    )]
    tool: Option<String>,

    /// Suite the results are recorded under
    #[arg(short, long)]
    suite: Option<String>,

    /// File holding the harness output ('-' for stdin)
    #[arg(short = 'f', long, conflicts_with = "command")]
    output_file: Option<PathBuf>,

    /// Shell command printing the harness output
    #[arg(long)]
    command: Option<String>,

    #[arg(long, value_enum)]
    backend: Option<StoreKind>,

    /// Document path for the file backend
    #[arg(long)]
    data_file: Option<PathBuf>,

    #[arg(long, env = "GITHUB_REPOSITORY")]
    github_repo: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[arg(long)]
    github_branch: Option<String>,

    /// Repository URL recorded in a new document
    #[arg(long)]
    repo_url: Option<String>,

    #[arg(long, env = "GITHUB_SERVER_URL", default_value = "https://github.com")]
    server_url: String,

    /// GitHub event payload describing the commit
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,

    /// Commit sha, instead of reading the event payload
    #[arg(long)]
    commit_id: Option<String>,

    /// RFC 3339 commit time (defaults to now)
    #[arg(long, requires = "commit_id")]
    commit_timestamp: Option<String>,

    #[arg(long, requires = "commit_id")]
    commit_message: Option<String>,

    #[arg(long, requires = "commit_id")]
    commit_author: Option<String>,

    #[arg(long, requires = "commit_id")]
    commit_url: Option<String>,

    /// Relative change that counts as a regression (2.0 = 200%)
    #[arg(long)]
    threshold: Option<f64>,

    /// Preceding entries averaged into the baseline
    #[arg(long)]
    window_size: Option<usize>,

    /// Exit with status 1 when a regression is detected
    #[arg(long)]
    fail_on_alert: bool,

    #[arg(long)]
    max_retries: Option<usize>,

    /// Reject a commit older than every recorded one
    #[arg(long)]
    strict: bool,

    /// Compare without saving the updated document
    #[arg(long)]
    no_save: bool,

    /// Write the alert report here (.md for Markdown, JSON otherwise)
    #[arg(long)]
    alerts_output: Option<PathBuf>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long)]
    pretty: bool,
}

impl RunArgs {
    /// Layers the flags over the file configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(tool) = &self.tool {
            config.ingest.tool = Some(tool.clone());
        }
        if let Some(suite) = &self.suite {
            config.ingest.suite.clone_from(suite);
        }
        if let Some(backend) = self.backend {
            config.store.backend = backend;
        }
        if let Some(data_file) = &self.data_file {
            config.store.data_file.clone_from(data_file);
        }
        if let Some(repo_url) = &self.repo_url {
            config.store.repo_url = Some(repo_url.clone());
        }
        if let Some(max_retries) = self.max_retries {
            config.store.max_retries = max_retries;
        }
        if self.strict {
            config.store.append_mode = AppendMode::Strict;
        }
        if self.no_save {
            config.store.save = false;
        }
        if let Some(repo) = &self.github_repo {
            config.github.repo = Some(repo.clone());
        }
        if let Some(token) = &self.github_token {
            config.github.token = Some(token.clone());
        }
        if let Some(branch) = &self.github_branch {
            config.github.branch.clone_from(branch);
        }
        if let Some(threshold) = self.threshold {
            config.detector.threshold = threshold;
        }
        if let Some(window_size) = self.window_size {
            config.detector.window_size = window_size;
        }
        if self.fail_on_alert {
            config.detector.fail_on_alert = true;
        }
        if let Some(alerts_output) = &self.alerts_output {
            config.output.alerts_file = Some(alerts_output.clone());
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.pretty {
            config.output.pretty = true;
        }
    }

    fn source(&self) -> Result<HarnessSource> {
        match (&self.command, &self.output_file) {
            (Some(command), _) => Ok(HarnessSource::Command(command.clone())),
            (None, Some(path)) => Ok(HarnessSource::File(path.clone())),
            (None, None) => bail!("Pass --output-file or --command to provide benchmark output"),
        }
    }

    fn commit(&self) -> Result<Commit> {
        if let Some(id) = &self.commit_id {
            return Ok(ManualCommit {
                id: id.clone(),
                timestamp: self.commit_timestamp.clone(),
                message: self.commit_message.clone(),
                author: self.commit_author.clone(),
                url: self.commit_url.clone(),
            }
            .into_commit());
        }

        match &self.event_path {
            Some(path) => commit::from_event_file(path)
                .with_context(|| format!("Failed to read commit from {}", path.display())),
            None => bail!("Pass --commit-id or --event-path to identify the benchmarked commit"),
        }
    }
}

/// Repository URL for a document created by this run.
///
/// An explicit URL wins, otherwise it is derived from the server and the
/// `owner/repo` name. Without either the document has no URL.
fn resolve_repo_url(
    explicit: Option<&str>,
    server_url: &str,
    repo: Option<&str>,
) -> Result<String> {
    if let Some(url) = explicit {
        Url::parse(url).with_context(|| format!("Invalid repository URL: {url}"))?;
        return Ok(url.trim_end_matches('/').to_string());
    }

    let Some(repo) = repo else {
        return Ok(String::new());
    };
    let server = Url::parse(&format!("{}/", server_url.trim_end_matches('/')))
        .with_context(|| format!("Invalid server URL: {server_url}"))?;
    let url = server
        .join(repo)
        .with_context(|| format!("Invalid repository name: {repo}"))?;
    Ok(url.to_string())
}

fn read_document(path: &Path) -> Result<(BenchmarkData, DataFormat)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    decode(&text).with_context(|| format!("Failed to load {}", path.display()))
}

impl Cli {
    async fn execute_run(&self, args: &RunArgs) -> Result<ExitCode> {
        let mut config = Config::load(self.config.as_deref())?;
        args.apply(&mut config);
        config.validate()?;

        let Some(tool) = config.ingest.tool.as_deref() else {
            bail!("No benchmark tool given; pass --tool or set ingest.tool");
        };
        let suite = config.ingest.suite.clone();
        let source = args.source()?;
        let commit = args.commit()?;
        let repo_url = resolve_repo_url(
            config.store.repo_url.as_deref(),
            &args.server_url,
            config.github.repo.as_deref(),
        )?;

        info!("Recording {tool} results for suite '{suite}' at {}", commit.id);

        let progress = PhaseProgress::start_collect();
        let raw_output = harness::collect(&source).await?;
        let benches = ingest::parse(tool, &raw_output)?;
        let entry = Entry {
            commit,
            date: Utc::now().timestamp_millis(),
            tool: tool.to_string(),
            benches,
        };

        let backend = Backend::from_config(&config.store, &config.github)?;
        let progress =
            progress.finish_collect_start_store(entry.benches.len(), &backend.describe());
        let mode = config.store.append_mode;
        let data = if config.store.save {
            let message = format!(
                "add {suite} ({}) benchmark result for {}",
                entry.tool,
                entry.id()
            );
            commit_with_retry(
                &backend,
                config.store.max_retries,
                &repo_url,
                &message,
                |current| current.append(&suite, entry.clone(), mode),
            )
            .await?
        } else {
            let snapshot = backend.read().await?;
            snapshot
                .data
                .unwrap_or_else(|| BenchmarkData::new(repo_url.as_str()))
                .append(&suite, entry.clone(), mode)?
        };

        let progress = progress.finish_store_start_detect(config.store.save);
        let history = data.load(&suite);
        let comparisons = detector::compare(history, &entry, &config.detector);
        let alerts: Vec<Alert> = comparisons.iter().filter_map(Comparison::alert).collect();
        progress.finish_detect(alerts.len());

        let regressed = !alerts.is_empty();
        let report = AlertReport::new(&suite, &entry, &config.detector, alerts);

        match config.output.format {
            OutputFormat::Summary => print_summary(&RunSummary {
                suite: &suite,
                entry: &entry,
                history_len: history.len(),
                detector: &config.detector,
                comparisons: &comparisons,
            }),
            OutputFormat::Json | OutputFormat::Markdown => {
                let format = if config.output.format == OutputFormat::Json {
                    ReportFormat::Json
                } else {
                    ReportFormat::Markdown
                };
                let mut stdout = std::io::stdout().lock();
                export_report(&report, format, config.output.pretty, &mut stdout)?;
            }
        }

        if let Some(path) = &config.output.alerts_file {
            write_report_file(&report, path, config.output.pretty)?;
        }

        if regressed {
            warn!(
                "{} benchmark(s) in '{suite}' regressed beyond {}%",
                report.alerts.len(),
                config.detector.threshold * 100.0
            );
            if config.detector.fail_on_alert {
                return Ok(ExitCode::from(1));
            }
        }

        Ok(ExitCode::SUCCESS)
    }

    fn execute_merge(left: &Path, right: &Path, output: Option<&Path>) -> Result<()> {
        let (left_data, format) = read_document(left)?;
        let (right_data, _) = read_document(right)?;

        let merged = left_data.merge(&right_data);
        let text = encode(&merged, format)?;

        if let Some(path) = output {
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Merged document written to: {}", path.display());
        } else {
            std::io::stdout().lock().write_all(text.as_bytes())?;
        }

        Ok(())
    }

    fn execute_check(file: &Path) -> Result<()> {
        let (data, _) = read_document(file)?;
        info!("{} is valid ({} suites)", file.display(), data.entries.len());
        print_suites(&data);
        Ok(())
    }

    /// Runs the selected subcommand and returns the process exit status.
    pub async fn execute(&self) -> Result<ExitCode> {
        match &self.command {
            Commands::Run(args) => self.execute_run(args).await,
            Commands::Merge {
                left,
                right,
                output,
            } => Self::execute_merge(left, right, output.as_deref()).map(|()| ExitCode::SUCCESS),
            Commands::Check { file } => Self::execute_check(file).map(|()| ExitCode::SUCCESS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::{entry, rate};
    use tempfile::TempDir;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["benchkeeper", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Run(args) => *args,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = run_args(&[
            "--tool",
            "cargo",
            "--suite",
            "Parser",
            "--threshold",
            "0.25",
            "--window-size",
            "3",
            "--strict",
            "--no-save",
            "--backend",
            "github",
            "--github-repo",
            "acme/widgets",
            "--format",
            "markdown",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.ingest.tool.as_deref(), Some("cargo"));
        assert_eq!(config.ingest.suite, "Parser");
        assert!((config.detector.threshold - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.detector.window_size, 3);
        assert_eq!(config.store.append_mode, AppendMode::Strict);
        assert!(!config.store.save);
        assert_eq!(config.store.backend, StoreKind::GitHub);
        assert_eq!(config.github.repo.as_deref(), Some("acme/widgets"));
        assert_eq!(config.output.format, OutputFormat::Markdown);
    }

    #[test]
    fn test_unset_flags_keep_config() {
        let args = RunArgs::default();
        let mut config = Config::default();
        config.detector.threshold = 0.1;
        config.ingest.tool = Some("go".to_string());
        args.apply(&mut config);

        assert!((config.detector.threshold - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.ingest.tool.as_deref(), Some("go"));
        assert!(config.store.save);
    }

    #[test]
    fn test_unknown_tool_flag_is_rejected() {
        let result = Cli::try_parse_from(["benchkeeper", "run", "--tool", "junit"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_file_and_command_conflict() {
        let result = Cli::try_parse_from([
            "benchkeeper",
            "run",
            "--output-file",
            "out.txt",
            "--command",
            "cargo bench",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_manual_commit_takes_precedence() {
        let sha = "ab".repeat(20);
        let args = run_args(&[
            "--commit-id",
            &sha,
            "--commit-timestamp",
            "2025-05-08T20:39:11+03:00",
            "--event-path",
            "/nonexistent/event.json",
        ]);

        let commit = args.commit().unwrap();
        assert_eq!(commit.id, sha);
        assert_eq!(commit.timestamp, "2025-05-08T20:39:11+03:00");
    }

    #[test]
    fn test_missing_commit_source_is_an_error() {
        let args = RunArgs::default();
        assert!(args.commit().is_err());
        assert!(args.source().is_err());
    }

    #[test]
    fn test_resolve_repo_url() {
        assert_eq!(
            resolve_repo_url(None, "https://github.com", Some("acme/widgets")).unwrap(),
            "https://github.com/acme/widgets"
        );
        assert_eq!(
            resolve_repo_url(Some("https://example.com/acme/widgets/"), "https://github.com", None)
                .unwrap(),
            "https://example.com/acme/widgets"
        );
        assert_eq!(resolve_repo_url(None, "https://github.com", None).unwrap(), "");
        assert!(resolve_repo_url(Some("not a url"), "https://github.com", None).is_err());
    }

    #[test]
    fn test_merge_writes_union() {
        let dir = TempDir::new().unwrap();
        let left_path = dir.path().join("left.json");
        let right_path = dir.path().join("right.json");
        let out_path = dir.path().join("merged.json");

        let base = BenchmarkData::new("https://github.com/acme/widgets");
        let left = base
            .append(
                "Benchmark",
                entry(1, "2025-05-01T00:00:00Z", vec![rate("q", 1.0)]),
                AppendMode::Merge,
            )
            .unwrap();
        let right = base
            .append(
                "Benchmark",
                entry(2, "2025-05-02T00:00:00Z", vec![rate("q", 2.0)]),
                AppendMode::Merge,
            )
            .unwrap();
        std::fs::write(&left_path, encode(&left, DataFormat::Json).unwrap()).unwrap();
        std::fs::write(&right_path, encode(&right, DataFormat::Json).unwrap()).unwrap();

        Cli::execute_merge(&left_path, &right_path, Some(out_path.as_path())).unwrap();

        let (merged, _) = read_document(&out_path).unwrap();
        assert_eq!(merged.load("Benchmark").len(), 2);
        assert_eq!(merged, left.merge(&right));
    }

    #[test]
    fn test_check_rejects_corrupt_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.js");
        std::fs::write(&path, "window.BENCHMARK_DATA = {\"entries\": 3};").unwrap();

        assert!(Cli::execute_check(&path).is_err());
    }
}
