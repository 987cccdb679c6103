use serde::Deserialize;

use crate::document::Bench;
use crate::error::{BenchError, Result};

use super::{finite, ToolKind};

/// One element of a hand-written results file.
#[derive(Deserialize)]
struct CustomResult {
    name: String,
    value: f64,
    unit: String,
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    extra: Option<String>,
}

pub(super) fn parse_bigger_is_better(raw_output: &str) -> Result<Vec<Bench>> {
    parse(ToolKind::CustomBiggerIsBetter, raw_output)
}

pub(super) fn parse_smaller_is_better(raw_output: &str) -> Result<Vec<Bench>> {
    parse(ToolKind::CustomSmallerIsBetter, raw_output)
}

fn parse(tool: ToolKind, raw_output: &str) -> Result<Vec<Bench>> {
    let results: Vec<CustomResult> = serde_json::from_str(raw_output)
        .map_err(|e| BenchError::malformed(tool.as_str(), e.to_string()))?;

    results
        .into_iter()
        .map(|result| {
            let value = finite(tool, &result.name, result.value)?;
            Ok(Bench {
                name: result.name,
                value,
                unit: result.unit,
                kind: tool.unit_kind(),
                range: result.range,
                extra: result.extra,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::document::UnitKind;

    const RESULTS: &str = r#"[
        {"name": "throughput[64]", "value": 812.5, "unit": "MB/s", "range": "3"},
        {"name": "latency", "value": 12, "unit": "ms", "extra": "p99"}
    ]"#;

    #[test]
    fn test_direction_follows_tool() {
        let bigger = parse_bigger_is_better(RESULTS).unwrap();
        assert!(bigger.iter().all(|b| b.kind == UnitKind::Rate));

        let smaller = parse_smaller_is_better(RESULTS).unwrap();
        assert!(smaller.iter().all(|b| b.kind == UnitKind::Duration));
    }

    #[test]
    fn test_optional_fields_are_kept() {
        let benches = parse_bigger_is_better(RESULTS).unwrap();
        assert_eq!(benches[0].range.as_deref(), Some("3"));
        assert_eq!(benches[0].extra, None);
        assert_eq!(benches[1].value, 12.0);
        assert_eq!(benches[1].extra.as_deref(), Some("p99"));
    }

    #[test]
    fn test_missing_value_is_malformed() {
        let err = parse_smaller_is_better(r#"[{"name": "a", "unit": "ms"}]"#).unwrap_err();
        assert!(err.to_string().contains("value"));
    }
}
