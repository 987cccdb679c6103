use std::sync::LazyLock;

use regex::Regex;

use crate::document::Bench;
use crate::error::Result;

use super::{display_number, parse_number, ToolKind};

// test fib_10 ... bench:         135 ns/iter (+/- 24)
static BENCH_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^test (.+?)\s+\.\.\. bench:\s+([0-9,.]+) (\S+) \(\+/- ([0-9,.]+)\)")
        .expect("cargo bench pattern is valid")
});

/// Parses libtest `cargo bench` output.
pub(super) fn parse(raw_output: &str) -> Result<Vec<Bench>> {
    let tool = ToolKind::Cargo;

    raw_output
        .lines()
        .filter_map(|line| BENCH_LINE.captures(line.trim_end()))
        .map(|caps| {
            let value = parse_number(tool, "value", &caps[2])?;
            let deviation = parse_number(tool, "deviation", &caps[4])?;
            Ok(Bench::new(&caps[1], value, &caps[3], tool.unit_kind())
                .with_range(format!("± {}", display_number(deviation))))
        })
        .collect()
}
