mod benchmarkjs;
mod cargo;
mod custom;
mod go;
mod googlecpp;
mod pytest;

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::document::{Bench, UnitKind};
use crate::error::{BenchError, Result};

/// Benchmark harnesses whose output can be ingested.
///
/// Names match the `tool` field written into each entry, so they must stay
/// stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    #[serde(rename = "cargo")]
    Cargo,
    #[serde(rename = "go")]
    Go,
    #[serde(rename = "benchmarkjs")]
    BenchmarkJs,
    #[serde(rename = "pytest")]
    Pytest,
    #[serde(rename = "googlecpp")]
    GoogleCpp,
    #[serde(rename = "customBiggerIsBetter")]
    CustomBiggerIsBetter,
    #[serde(rename = "customSmallerIsBetter")]
    CustomSmallerIsBetter,
}

type Parser = fn(&str) -> Result<Vec<Bench>>;

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::Cargo,
        ToolKind::Go,
        ToolKind::BenchmarkJs,
        ToolKind::Pytest,
        ToolKind::GoogleCpp,
        ToolKind::CustomBiggerIsBetter,
        ToolKind::CustomSmallerIsBetter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Cargo => "cargo",
            ToolKind::Go => "go",
            ToolKind::BenchmarkJs => "benchmarkjs",
            ToolKind::Pytest => "pytest",
            ToolKind::GoogleCpp => "googlecpp",
            ToolKind::CustomBiggerIsBetter => "customBiggerIsBetter",
            ToolKind::CustomSmallerIsBetter => "customSmallerIsBetter",
        }
    }

    /// Direction shared by every bench this tool produces.
    pub fn unit_kind(self) -> UnitKind {
        match self {
            ToolKind::BenchmarkJs | ToolKind::Pytest | ToolKind::CustomBiggerIsBetter => {
                UnitKind::Rate
            }
            ToolKind::Cargo
            | ToolKind::Go
            | ToolKind::GoogleCpp
            | ToolKind::CustomSmallerIsBetter => UnitKind::Duration,
        }
    }

    fn parser(self) -> Parser {
        match self {
            ToolKind::Cargo => cargo::parse,
            ToolKind::Go => go::parse,
            ToolKind::BenchmarkJs => benchmarkjs::parse,
            ToolKind::Pytest => pytest::parse,
            ToolKind::GoogleCpp => googlecpp::parse,
            ToolKind::CustomBiggerIsBetter => custom::parse_bigger_is_better,
            ToolKind::CustomSmallerIsBetter => custom::parse_smaller_is_better,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = BenchError;

    fn from_str(name: &str) -> Result<Self> {
        ToolKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| BenchError::UnsupportedTool(name.to_string()))
    }
}

/// Normalizes one tool's raw output into benches.
///
/// # Errors
///
/// Returns [`BenchError::UnsupportedTool`] for an unknown tool name and
/// [`BenchError::MalformedOutput`] when the output has no usable results.
pub fn parse(tool: &str, raw_output: &str) -> Result<Vec<Bench>> {
    let kind: ToolKind = tool.parse()?;
    parse_with(kind, raw_output)
}

/// Same as [`parse`] for an already resolved tool kind.
pub fn parse_with(kind: ToolKind, raw_output: &str) -> Result<Vec<Bench>> {
    let benches = (kind.parser())(raw_output)?;

    if benches.is_empty() {
        return Err(BenchError::malformed(
            kind.as_str(),
            "no benchmark results found",
        ));
    }

    for bench in &benches {
        debug!("Parsed {} = {} {}", bench.name, bench.value, bench.unit);
    }
    info!("Ingested {} benches from {kind} output", benches.len());

    Ok(benches)
}

/// Parses a number the way harnesses print it, with optional thousands
/// separators.
fn parse_number(tool: ToolKind, field: &str, text: &str) -> Result<f64> {
    let cleaned = text.replace(',', "");
    let value: f64 = cleaned
        .parse()
        .map_err(|_| BenchError::malformed(tool.as_str(), format!("{field} '{text}' is not a number")))?;
    finite(tool, field, value)
}

fn finite(tool: ToolKind, field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BenchError::malformed(
            tool.as_str(),
            format!("{field} is not a finite number"),
        ))
    }
}

/// Formats a number the way the chart page prints it, dropping `.0` on
/// integral values. Magnitudes below 1e-6 or from 1e21 up switch to
/// exponent notation with an explicit exponent sign.
fn display_number(value: f64) -> String {
    let magnitude = value.abs();
    if value != 0.0 && !(1e-6..1e21).contains(&magnitude) {
        let exp = format!("{value:e}");
        match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => {
                format!("{mantissa}e+{power}")
            }
            _ => exp,
        }
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_is_unsupported() {
        let err = parse("junit", "").unwrap_err();
        assert!(matches!(err, BenchError::UnsupportedTool(name) if name == "junit"));
    }

    #[test]
    fn test_tool_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(kind.as_str().parse::<ToolKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_empty_output_is_malformed() {
        let err = parse("cargo", "running 0 tests\n").unwrap_err();
        assert!(matches!(err, BenchError::MalformedOutput { .. }));
    }

    #[test]
    fn test_parse_number_strips_separators() {
        assert_eq!(parse_number(ToolKind::Cargo, "value", "1,234,567").unwrap(), 1_234_567.0);
        assert!(parse_number(ToolKind::Cargo, "value", "abc").is_err());
        assert!(parse_number(ToolKind::Cargo, "value", "inf").is_err());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let raw = "test fib ... bench:         135 ns/iter (+/- 24)\n";
        assert_eq!(parse("cargo", raw).unwrap(), parse("cargo", raw).unwrap());
    }

    #[test]
    fn test_display_number_matches_chart_format() {
        assert_eq!(display_number(24.0), "24");
        assert_eq!(display_number(0.5), "0.5");
    }

    #[test]
    fn test_display_number_uses_exponent_outside_plain_range() {
        assert_eq!(display_number(0.00001626636160911111), "0.00001626636160911111");
        assert_eq!(display_number(0.000001), "0.000001");
        assert_eq!(display_number(1.5e-7), "1.5e-7");
        assert_eq!(display_number(-2.5e-9), "-2.5e-9");
        assert_eq!(display_number(1e21), "1e+21");
        assert_eq!(display_number(123456789.0), "123456789");
        assert_eq!(display_number(0.0), "0");
    }
}
