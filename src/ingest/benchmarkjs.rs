use std::sync::LazyLock;

use regex::Regex;

use crate::document::Bench;
use crate::error::Result;

use super::{parse_number, ToolKind};

// fib(10) x 1,431,759 ops/sec ±0.74% (93 runs sampled)
static BENCH_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+) x ([0-9,.]+) (\S+) ±([0-9.]+)% \((\d+) runs? sampled\)$")
        .expect("benchmark.js pattern is valid")
});

/// Parses the console output of a Benchmark.js suite.
pub(super) fn parse(raw_output: &str) -> Result<Vec<Bench>> {
    let tool = ToolKind::BenchmarkJs;

    raw_output
        .lines()
        .filter_map(|line| BENCH_LINE.captures(line.trim()))
        .map(|caps| {
            let value = parse_number(tool, "ops", &caps[2])?;
            Ok(Bench::new(&caps[1], value, &caps[3], tool.unit_kind())
                .with_range(format!("±{}%", &caps[4]))
                .with_extra(format!("{} samples", &caps[5])))
        })
        .collect()
}
