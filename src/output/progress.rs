use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{heading, toned, Tone};

const TICK: Duration = Duration::from_millis(100);

/// Spinner per stage of a `run`: collecting output, updating the history,
/// detecting regressions.
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_collect() -> Self {
        eprintln!("⚙️  {}", heading("Phases"));
        let pb =
            create_spinner(toned(Tone::Warning, "1/3: Collecting benchmark output").to_string());
        Self { pb }
    }

    pub fn finish_collect_start_store(self, benches: usize, target: &str) -> Self {
        self.pb.finish_with_message(
            toned(Tone::Good, format!("1/3: Parsed {benches} benchmark results ✓")).to_string(),
        );
        let pb =
            create_spinner(toned(Tone::Warning, format!("2/3: Updating {target}")).to_string());
        Self { pb }
    }

    pub fn finish_store_start_detect(self, saved: bool) -> Self {
        let message = if saved {
            "2/3: History updated ✓"
        } else {
            "2/3: History updated (not saved) ✓"
        };
        self.pb.finish_with_message(toned(Tone::Good, message).to_string());
        let pb = create_spinner(toned(Tone::Warning, "3/3: Detecting regressions").to_string());
        Self { pb }
    }

    pub fn finish_detect(self, alerts: usize) {
        let message = if alerts == 0 {
            toned(Tone::Good, "3/3: No regressions detected ✓")
        } else {
            toned(Tone::Warning, format!("3/3: {alerts} regression(s) detected"))
        };
        self.pb.finish_with_message(message.to_string());
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .unwrap(),
    );
    pb.set_message(message);
    pb.enable_steady_tick(TICK);
    pb
}
