use serde::Deserialize;

use crate::document::Bench;
use crate::error::{BenchError, Result};

use super::{display_number, finite, ToolKind};

/// Report written by `--benchmark_format=json`.
#[derive(Deserialize)]
struct GoogleBenchmarkReport {
    benchmarks: Vec<GoogleBenchmark>,
}

#[derive(Deserialize)]
struct GoogleBenchmark {
    name: String,
    #[serde(default)]
    run_type: Option<String>,
    iterations: u64,
    real_time: f64,
    cpu_time: f64,
    time_unit: String,
    #[serde(default)]
    threads: Option<u32>,
}

pub(super) fn parse(raw_output: &str) -> Result<Vec<Bench>> {
    let tool = ToolKind::GoogleCpp;
    let report: GoogleBenchmarkReport = serde_json::from_str(raw_output)
        .map_err(|e| BenchError::malformed(tool.as_str(), e.to_string()))?;

    report
        .benchmarks
        .into_iter()
        // mean/median/stddev rows repeat the iteration rows
        .filter(|bench| bench.run_type.as_deref() != Some("aggregate"))
        .map(|bench| {
            let real_time = finite(tool, "real_time", bench.real_time)?;
            let cpu_time = finite(tool, "cpu_time", bench.cpu_time)?;
            let extra = format!(
                "iterations: {}\ncpu: {} {}\nthreads: {}",
                bench.iterations,
                display_number(cpu_time),
                bench.time_unit,
                bench.threads.unwrap_or(1)
            );
            Ok(Bench::new(bench.name, real_time, bench.time_unit, tool.unit_kind())
                .with_extra(extra))
        })
        .collect()
}
