use serde::Deserialize;

use crate::document::Bench;
use crate::error::{BenchError, Result};

use super::{display_number, finite, ToolKind};

/// Report written by `pytest --benchmark-json`.
#[derive(Deserialize)]
struct PytestReport {
    benchmarks: Vec<PytestBenchmark>,
}

#[derive(Deserialize)]
struct PytestBenchmark {
    fullname: String,
    stats: PytestStats,
}

#[derive(Deserialize)]
struct PytestStats {
    ops: f64,
    mean: f64,
    stddev: f64,
    rounds: u64,
}

pub(super) fn parse(raw_output: &str) -> Result<Vec<Bench>> {
    let tool = ToolKind::Pytest;
    let report: PytestReport = serde_json::from_str(raw_output)
        .map_err(|e| BenchError::malformed(tool.as_str(), e.to_string()))?;

    report
        .benchmarks
        .into_iter()
        .map(|bench| {
            let ops = finite(tool, "stats.ops", bench.stats.ops)?;
            let mean = finite(tool, "stats.mean", bench.stats.mean)?;
            let stddev = finite(tool, "stats.stddev", bench.stats.stddev)?;
            let (mean, mean_unit) = human_readable_seconds(mean);

            Ok(Bench::new(bench.fullname, ops, "iter/sec", tool.unit_kind())
                .with_range(format!("stddev: {}", display_number(stddev)))
                .with_extra(format!(
                    "mean: {} {mean_unit}\nrounds: {}",
                    display_number(mean),
                    bench.stats.rounds
                )))
        })
        .collect()
}

/// Scales a duration in seconds to the largest unit that keeps it >= 1.
fn human_readable_seconds(seconds: f64) -> (f64, &'static str) {
    if seconds < 1.0e-6 {
        (seconds * 1.0e9, "nsec")
    } else if seconds < 1.0e-3 {
        (seconds * 1.0e6, "usec")
    } else if seconds < 1.0 {
        (seconds * 1.0e3, "msec")
    } else {
        (seconds, "sec")
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::document::UnitKind;

    const REPORT: &str = r#"{
        "machine_info": {"node": "runner"},
        "benchmarks": [
            {
                "group": null,
                "name": "test_return",
                "fullname": "tests/bench.py::test_return",
                "params": null,
                "stats": {
                    "min": 0.0001,
                    "max": 0.0002,
                    "mean": 0.00010415176433376925,
                    "stddev": 0.00001626636160911111,
                    "rounds": 2529,
                    "median": 0.0001,
                    "ops": 9601.37359550969
                }
            },
            {
                "name": "test_unwind[1000]",
                "fullname": "tests/bench.py::test_unwind[1000]",
                "stats": {
                    "mean": 4.889389625200005,
                    "stddev": 0.06944593012166002,
                    "rounds": 5,
                    "ops": 0.20452450646313428
                }
            }
        ]
    }"#;

    #[test]
    fn test_parses_pytest_benchmark_report() {
        let benches = parse(REPORT).unwrap();
        assert_eq!(benches.len(), 2);

        let first = &benches[0];
        assert_eq!(first.name, "tests/bench.py::test_return");
        assert_eq!(first.value, 9601.37359550969);
        assert_eq!(first.unit, "iter/sec");
        assert_eq!(first.kind, UnitKind::Rate);
        assert_eq!(first.range.as_deref(), Some("stddev: 0.00001626636160911111"));
        let extra = first.extra.as_deref().unwrap();
        assert!(extra.starts_with("mean: 104.15"), "got {extra}");
        assert!(extra.ends_with("usec\nrounds: 2529"), "got {extra}");

        let second = &benches[1];
        assert_eq!(second.name, "tests/bench.py::test_unwind[1000]");
        assert_eq!(
            second.extra.as_deref(),
            Some("mean: 4.889389625200005 sec\nrounds: 5")
        );
    }

    #[test]
    fn test_missing_stats_field_is_malformed() {
        let raw = r#"{"benchmarks": [{"fullname": "t", "stats": {"mean": 1.0}}]}"#;
        let err = parse(raw).unwrap_err();
        assert!(matches!(err, BenchError::MalformedOutput { .. }));
        assert!(err.to_string().contains("ops"));
    }

    #[test]
    fn test_not_json_is_malformed() {
        assert!(matches!(
            parse("==== 3 passed ====").unwrap_err(),
            BenchError::MalformedOutput { .. }
        ));
    }

    #[test]
    fn test_human_readable_seconds() {
        assert_eq!(human_readable_seconds(2.0), (2.0, "sec"));
        assert_eq!(human_readable_seconds(0.5).1, "msec");
        assert_eq!(human_readable_seconds(0.000_5).1, "usec");
        assert_eq!(human_readable_seconds(0.000_000_5).1, "nsec");
    }
}
