use std::sync::LazyLock;

use regex::Regex;

use crate::document::Bench;
use crate::error::{BenchError, Result};

use super::{parse_number, ToolKind};

// BenchmarkFib10-8   	 5000000	       325 ns/op	       0 B/op
static BENCH_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Benchmark\S*?)(?:-(\d+))?\s+(\d+)\s+(.+)$")
        .expect("go bench pattern is valid")
});

/// Parses `go test -bench` output.
///
/// The first metric on a line becomes the bench itself. Further metrics
/// (`B/op`, `allocs/op`, custom ones) become benches named `<name> - <unit>`.
pub(super) fn parse(raw_output: &str) -> Result<Vec<Bench>> {
    let tool = ToolKind::Go;
    let mut benches = Vec::new();

    for caps in raw_output
        .lines()
        .filter_map(|line| BENCH_LINE.captures(line.trim_end()))
    {
        let name = &caps[1];
        let times = &caps[3];
        let mut extra = format!("{times} times");
        if let Some(procs) = caps.get(2) {
            extra.push_str(&format!("\n{} procs", procs.as_str()));
        }

        let metrics = parse_metrics(tool, name, &caps[4])?;
        for (index, (value, unit)) in metrics.into_iter().enumerate() {
            let bench_name = if index == 0 {
                name.to_string()
            } else {
                format!("{name} - {unit}")
            };
            benches.push(
                Bench::new(bench_name, value, unit, tool.unit_kind()).with_extra(extra.clone()),
            );
        }
    }

    Ok(benches)
}

fn parse_metrics<'a>(tool: ToolKind, name: &str, remainder: &'a str) -> Result<Vec<(f64, &'a str)>> {
    let tokens: Vec<&str> = remainder.split_whitespace().collect();
    if tokens.len() % 2 != 0 {
        return Err(BenchError::malformed(
            tool.as_str(),
            format!("metrics for {name} are not value/unit pairs: '{remainder}'"),
        ));
    }

    tokens
        .chunks(2)
        .map(|pair| Ok((parse_number(tool, name, pair[0])?, pair[1])))
        .collect()
}
