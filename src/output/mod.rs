mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::{export_report, write_report_file, AlertReport, ReportFormat};
pub use progress::PhaseProgress;
pub use styling::{title, toned, Tone};
pub use summary::{print_suites, print_summary, RunSummary};

/// Prints the benchkeeper banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        title("⏱  benchkeeper"),
        toned(Tone::Muted, env!("CARGO_PKG_VERSION")),
        toned(Tone::Muted, "Continuous benchmark history and regression alerts")
    );
}
