use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::document::{Bench, Entry, UnitKind};
use crate::store::History;

/// A bench whose new value moved the wrong way by at least the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub bench_name: String,
    pub delta: f64,
    pub baseline_value: f64,
    pub new_value: f64,
    pub unit: String,
    /// Number of preceding values averaged into the baseline
    pub samples: usize,
}

/// Outcome of comparing one bench of the new entry against its baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub bench_name: String,
    pub unit: String,
    pub kind: UnitKind,
    pub new_value: f64,
    pub baseline: Option<Baseline>,
    pub regressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub value: f64,
    pub samples: usize,
    pub delta: f64,
}

impl Comparison {
    pub fn alert(&self) -> Option<Alert> {
        let baseline = self.baseline.filter(|_| self.regressed)?;
        Some(Alert {
            bench_name: self.bench_name.clone(),
            delta: baseline.delta,
            baseline_value: baseline.value,
            new_value: self.new_value,
            unit: self.unit.clone(),
            samples: baseline.samples,
        })
    }
}

/// Regression alerts for `new_entry` against the entries preceding it.
///
/// Only adverse changes alert: a drop for rate units, a rise for duration
/// units. Benches without a usable baseline never alert.
#[allow(dead_code)]
pub fn evaluate(history: History<'_>, new_entry: &Entry, config: &DetectorConfig) -> Vec<Alert> {
    compare(history, new_entry, config)
        .iter()
        .filter_map(Comparison::alert)
        .collect()
}

/// Compares every bench of `new_entry`, alerting or not.
pub fn compare(
    history: History<'_>,
    new_entry: &Entry,
    config: &DetectorConfig,
) -> Vec<Comparison> {
    let preceding = history.preceding(new_entry);
    let window = config.window_size.max(1);

    new_entry
        .benches
        .iter()
        .map(|bench| {
            let baseline = baseline_for(preceding, bench, window);
            let regressed = baseline
                .is_some_and(|baseline| is_adverse(bench.kind, baseline.delta, config.threshold));

            match baseline {
                Some(baseline) if regressed => debug!(
                    "{}: {} -> {} ({:+.1}%) regressed",
                    bench.name,
                    baseline.value,
                    bench.value,
                    baseline.delta * 100.0
                ),
                Some(baseline) => debug!(
                    "{}: {} -> {} ({:+.1}%)",
                    bench.name,
                    baseline.value,
                    bench.value,
                    baseline.delta * 100.0
                ),
                None => debug!("{}: no baseline", bench.name),
            }

            Comparison {
                bench_name: bench.name.clone(),
                unit: bench.unit.clone(),
                kind: bench.kind,
                new_value: bench.value,
                baseline,
                regressed,
            }
        })
        .collect()
}

/// Mean of the same series over the closest preceding entries.
///
/// The window stops at the first entry that lacks the series, so a bench
/// that disappeared and came back starts over without a baseline.
#[allow(clippy::cast_precision_loss)]
fn baseline_for(preceding: &[Entry], bench: &Bench, window: usize) -> Option<Baseline> {
    let values: Vec<f64> = preceding
        .iter()
        .rev()
        .take(window)
        .map_while(|entry| {
            entry
                .bench(&bench.name)
                .filter(|previous| previous.same_series(bench))
                .map(|previous| previous.value)
        })
        .collect();

    if values.is_empty() {
        return None;
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 || !mean.is_finite() || !bench.value.is_finite() {
        warn!(
            "Skipping {}: baseline {mean} cannot be compared against {}",
            bench.name, bench.value
        );
        return None;
    }

    Some(Baseline {
        value: mean,
        samples: values.len(),
        delta: (bench.value - mean) / mean,
    })
}

fn is_adverse(kind: UnitKind, delta: f64, threshold: f64) -> bool {
    match kind {
        UnitKind::Rate => delta <= -threshold,
        UnitKind::Duration => delta >= threshold,
    }
}
