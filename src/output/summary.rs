use std::fmt::Write;

use comfy_table::Cell;

use crate::config::DetectorConfig;
use crate::detector::Comparison;
use crate::document::{BenchmarkData, Entry};

use super::styling::{heading, toned, Tone};
use super::tables::{
    color_coded_change_cell, create_cyan_header, create_table, status_cell, value_cell,
};

/// Everything the terminal summary of a `run` shows.
pub struct RunSummary<'a> {
    pub suite: &'a str,
    pub entry: &'a Entry,
    /// Entries in the suite after the append
    pub history_len: usize,
    pub detector: &'a DetectorConfig,
    pub comparisons: &'a [Comparison],
}

/// Prints a human-readable summary of a benchmark run to stdout.
///
/// Shows the recorded commit, a table with every bench of the new entry
/// against its baseline, and the regressions that crossed the threshold.
pub fn print_summary(summary: &RunSummary<'_>) {
    println!("{}", render_summary(summary));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{emoji} {}", heading(title));
}

fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}

fn render_summary(summary: &RunSummary<'_>) -> String {
    let mut output = String::new();
    let commit = &summary.entry.commit;
    let regressions: Vec<&Comparison> =
        summary.comparisons.iter().filter(|c| c.regressed).collect();

    add_section_header(&mut output, "📊", "Overview");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {} {}\n  {} {}\n  {} {}\n  {} {:.0}% over {} entr{}\n",
        toned(Tone::Muted, "Suite:"),
        toned(Tone::Label, summary.suite),
        toned(Tone::Muted, "Commit:"),
        toned(Tone::Warning, short_id(&commit.id)),
        commit.message.lines().next().unwrap_or_default(),
        toned(Tone::Muted, "Tool:"),
        summary.entry.tool,
        toned(Tone::Muted, "Entries in history:"),
        toned(Tone::Warning, summary.history_len),
        toned(Tone::Muted, "Threshold:"),
        summary.detector.threshold * 100.0,
        summary.detector.window_size,
        if summary.detector.window_size == 1 { "y" } else { "ies" },
    );

    add_section_header(&mut output, "📈", "Results");
    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Benchmark", "Current", "Baseline", "Change", "Status",
    ]));
    for comparison in summary.comparisons {
        let baseline = comparison.baseline.map_or_else(
            || Cell::new("-"),
            |baseline| value_cell(baseline.value, &comparison.unit),
        );
        table.add_row(vec![
            Cell::new(&comparison.bench_name),
            value_cell(comparison.new_value, &comparison.unit),
            baseline,
            color_coded_change_cell(comparison),
            status_cell(comparison),
        ]);
    }
    let _ = writeln!(output, "{table}\n");

    if regressions.is_empty() {
        let _ = writeln!(
            output,
            "{}",
            toned(Tone::Good, "✅ No performance regression detected.")
        );
        return output;
    }

    add_section_header(&mut output, "🚨", "Regressions");
    for comparison in regressions {
        if let Some(baseline) = comparison.baseline {
            let _ = writeln!(
                output,
                "  {} {} → {} {} ({:+.1}%)",
                toned(Tone::Bad, &comparison.bench_name),
                baseline.value,
                comparison.new_value,
                comparison.unit,
                baseline.delta * 100.0,
            );
        }
    }

    output
}

/// Prints the suites of a document with their size and latest entry.
pub fn print_suites(data: &BenchmarkData) {
    println!("{}", render_suites(data));
}

fn render_suites(data: &BenchmarkData) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "🗂", "Suites");
    let _ = writeln!(
        output,
        "  {} {}\n",
        toned(Tone::Muted, "Repository:"),
        toned(Tone::Label, &data.repo_url)
    );

    let mut table = create_table();
    table.set_header(create_cyan_header(&["Suite", "Entries", "Latest commit", "Benches"]));
    for suite in data.suites() {
        let history = data.load(suite);
        let (latest, benches) = history.last().map_or_else(
            || ("-".to_string(), String::new()),
            |entry| {
                let names: Vec<&str> = entry.benches.iter().map(|b| b.name.as_str()).collect();
                (
                    format!("{} {}", short_id(entry.id()), entry.commit.timestamp),
                    names.join("\n"),
                )
            },
        );
        table.add_row(vec![
            Cell::new(suite),
            Cell::new(history.len()),
            Cell::new(latest),
            Cell::new(benches),
        ]);
    }
    let _ = writeln!(output, "{table}");

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::compare;
    use crate::document::fixtures::{duration, entry, rate};
    use crate::document::BenchmarkData;

    fn render(history: &[Entry], new_entry: &Entry) -> String {
        let detector = DetectorConfig {
            threshold: 0.5,
            ..DetectorConfig::default()
        };
        let mut data = BenchmarkData::new("https://github.com/acme/widgets");
        data.entries.insert("Parser".to_string(), history.to_vec());
        let comparisons = compare(data.load("Parser"), new_entry, &detector);
        render_summary(&RunSummary {
            suite: "Parser",
            entry: new_entry,
            history_len: history.len(),
            detector: &detector,
            comparisons: &comparisons,
        })
    }

    #[test]
    fn test_summary_lists_every_bench() {
        let previous = entry(1, "2025-05-01T00:00:00Z", vec![rate("fast", 100.0)]);
        let current = entry(
            2,
            "2025-05-02T00:00:00Z",
            vec![rate("fast", 90.0), duration("fresh", 3.0)],
        );
        let history = vec![previous, current.clone()];

        let output = render(&history, &current);
        assert!(output.contains("Parser"));
        assert!(output.contains("fast"));
        assert!(output.contains("fresh"));
        assert!(output.contains("-10.0%"));
        assert!(output.contains("No performance regression detected"));
    }

    #[test]
    fn test_summary_reports_regressions() {
        let previous = entry(1, "2025-05-01T00:00:00Z", vec![duration("slow", 100.0)]);
        let current = entry(2, "2025-05-02T00:00:00Z", vec![duration("slow", 200.0)]);
        let history = vec![previous, current.clone()];

        let output = render(&history, &current);
        assert!(output.contains("Regressions"));
        assert!(output.contains("+100.0%"));
        assert!(!output.contains("No performance regression detected"));
    }

    #[test]
    fn test_suites_table() {
        let data = BenchmarkData::new("https://github.com/acme/widgets")
            .append(
                "Parser",
                entry(1, "2025-05-01T00:00:00Z", vec![rate("tokens", 1.0)]),
                crate::store::AppendMode::Merge,
            )
            .unwrap();

        let output = render_suites(&data);
        assert!(output.contains("https://github.com/acme/widgets"));
        assert!(output.contains("Parser"));
        assert!(output.contains("0101010"));
        assert!(output.contains("tokens"));
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id(&"ab".repeat(20)), "abababa");
        assert_eq!(short_id("abc"), "abc");
    }
}
