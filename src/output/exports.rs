use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::config::DetectorConfig;
use crate::detector::Alert;
use crate::document::Entry;

/// Alerts of one run, as handed to an external reporter (PR comment bot,
/// issue tracker, chat hook).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertReport {
    pub suite: String,
    pub commit: String,
    pub commit_url: String,
    pub threshold: f64,
    pub window_size: usize,
    pub alerts: Vec<Alert>,
}

impl AlertReport {
    pub fn new(suite: &str, entry: &Entry, detector: &DetectorConfig, alerts: Vec<Alert>) -> Self {
        Self {
            suite: suite.to_string(),
            commit: entry.commit.id.clone(),
            commit_url: entry.commit.url.clone(),
            threshold: detector.threshold,
            window_size: detector.window_size,
            alerts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Markdown,
}

impl ReportFormat {
    /// Markdown for `.md` files, JSON otherwise.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("md" | "markdown") => ReportFormat::Markdown,
            _ => ReportFormat::Json,
        }
    }
}

/// Writes the alert report in the requested format.
pub fn export_report(
    report: &AlertReport,
    format: ReportFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        ReportFormat::Json => export_json(report, pretty, output),
        ReportFormat::Markdown => export_markdown(report, output),
    }
}

/// Writes the alert report to `path`, picking the format from its extension.
pub fn write_report_file(report: &AlertReport, path: &Path, pretty: bool) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create alerts file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    export_report(report, ReportFormat::for_path(path), pretty, &mut writer)?;
    writer.flush()?;
    info!(
        "Wrote {} alert(s) to {}",
        report.alerts.len(),
        path.display()
    );
    Ok(())
}

fn export_json(report: &AlertReport, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn export_markdown(report: &AlertReport, output: &mut dyn Write) -> Result<()> {
    let commit = if report.commit_url.is_empty() {
        format!("`{}`", report.commit)
    } else {
        format!("[`{}`]({})", report.commit, report.commit_url)
    };

    if report.alerts.is_empty() {
        writeln!(
            output,
            "No performance regression detected for benchmark **'{}'** at {commit}.",
            escape_markdown(&report.suite)
        )?;
        return Ok(());
    }

    writeln!(output, "# :warning: **Performance Alert** :warning:\n")?;
    writeln!(
        output,
        "Possible performance regression was detected for benchmark **'{}'**.",
        escape_markdown(&report.suite)
    )?;
    writeln!(
        output,
        "Benchmark result of commit {commit} is worse than the baseline of the previous {} result(s) exceeding threshold `{}%`.\n",
        report.window_size,
        report.threshold * 100.0
    )?;

    writeln!(output, "| Benchmark | Current | Baseline | Change |")?;
    writeln!(output, "|-|-|-|-|")?;
    for alert in &report.alerts {
        writeln!(
            output,
            "| `{}` | `{}` {} | `{}` {} | `{:+.1}%` |",
            escape_markdown(&alert.bench_name),
            alert.new_value,
            escape_markdown(&alert.unit),
            alert.baseline_value,
            escape_markdown(&alert.unit),
            alert.delta * 100.0
        )?;
    }

    Ok(())
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::{duration, entry};
    use tempfile::NamedTempFile;

    fn report(alerts: Vec<Alert>) -> AlertReport {
        let new_entry = entry(2, "2025-05-02T00:00:00Z", vec![duration("parse", 300.0)]);
        AlertReport::new("Parser", &new_entry, &DetectorConfig::default(), alerts)
    }

    fn alert() -> Alert {
        Alert {
            bench_name: "parse|tokens".to_string(),
            delta: 2.0,
            baseline_value: 100.0,
            new_value: 300.0,
            unit: "ns/iter".to_string(),
            samples: 1,
        }
    }

    #[test]
    fn test_format_for_path() {
        assert_eq!(ReportFormat::for_path(Path::new("alerts.md")), ReportFormat::Markdown);
        assert_eq!(ReportFormat::for_path(Path::new("alerts.json")), ReportFormat::Json);
        assert_eq!(ReportFormat::for_path(Path::new("alerts")), ReportFormat::Json);
    }

    #[test]
    fn test_export_json() {
        let mut buffer = Vec::new();
        export_report(&report(vec![alert()]), ReportFormat::Json, false, &mut buffer).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["suite"], "Parser");
        assert_eq!(value["commit"], "02".repeat(20));
        assert_eq!(value["threshold"], 2.0);
        assert_eq!(value["alerts"][0]["benchName"], "parse|tokens");
        assert_eq!(value["alerts"][0]["baselineValue"], 100.0);
    }

    #[test]
    fn test_export_markdown_table() {
        let mut buffer = Vec::new();
        export_report(&report(vec![alert()]), ReportFormat::Markdown, false, &mut buffer)
            .unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Performance Alert"));
        assert!(text.contains("threshold `200%`"));
        assert!(text.contains("| `parse\\|tokens` | `300` ns/iter | `100` ns/iter | `+200.0%` |"));
    }

    #[test]
    fn test_export_markdown_without_alerts() {
        let mut buffer = Vec::new();
        export_report(&report(Vec::new()), ReportFormat::Markdown, false, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("No performance regression detected for benchmark **'Parser'**"));
    }

    #[test]
    fn test_write_report_file() {
        let temp_file = NamedTempFile::with_suffix(".md").unwrap();
        write_report_file(&report(vec![alert()]), temp_file.path(), false).unwrap();

        let text = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(text.starts_with("# :warning:"));
    }
}
