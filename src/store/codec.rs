use std::path::Path;

use crate::document::BenchmarkData;
use crate::error::{BenchError, Result};

const SCRIPT_PREFIX: &str = "window.BENCHMARK_DATA = ";

/// Shape of the persisted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// Plain JSON document
    Json,
    /// JSON assigned to `window.BENCHMARK_DATA`, loadable by the chart page
    Script,
}

impl DataFormat {
    /// Format for a file that does not exist yet, chosen by extension.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("js") => DataFormat::Script,
            _ => DataFormat::Json,
        }
    }
}

/// Parses and validates a persisted document.
///
/// # Errors
///
/// [`BenchError::StoreCorruption`] when the text is not a well-formed
/// document or breaks a history invariant. Nothing is repaired.
pub fn decode(text: &str) -> Result<(BenchmarkData, DataFormat)> {
    let trimmed = text.trim();
    let (json, format) = match trimmed.strip_prefix(SCRIPT_PREFIX) {
        Some(rest) => (rest.trim_end_matches(';'), DataFormat::Script),
        None => (trimmed, DataFormat::Json),
    };

    let data: BenchmarkData = serde_json::from_str(json)
        .map_err(|e| BenchError::StoreCorruption(e.to_string()))?;
    data.validate()?;

    Ok((data, format))
}

/// Serializes a document the way the chart page's own writer does: two
/// space indentation and no trailing newline.
pub fn encode(data: &BenchmarkData, format: DataFormat) -> Result<String> {
    let json = serde_json::to_string_pretty(data)?;
    Ok(match format {
        DataFormat::Json => json,
        DataFormat::Script => format!("{SCRIPT_PREFIX}{json}"),
    })
}
