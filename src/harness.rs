use std::path::PathBuf;

use log::{debug, info};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::{BenchError, Result};

/// Where the raw benchmark output comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarnessSource {
    /// Output file written by an earlier CI step (`-` reads stdin)
    File(PathBuf),
    /// Shell command whose stdout is the output
    Command(String),
}

/// Collects the raw output of the benchmark harness.
///
/// # Errors
///
/// [`BenchError::Harness`] when the command cannot be started or exits
/// unsuccessfully, [`BenchError::Io`] when the output file cannot be read.
pub async fn collect(source: &HarnessSource) -> Result<String> {
    match source {
        HarnessSource::File(path) if path.as_os_str() == "-" => {
            let mut output = String::new();
            tokio::io::stdin().read_to_string(&mut output).await?;
            Ok(output)
        }
        HarnessSource::File(path) => {
            debug!("Reading benchmark output from {}", path.display());
            Ok(tokio::fs::read_to_string(path).await?)
        }
        HarnessSource::Command(command) => run(command).await,
    }
}

async fn run(command: &str) -> Result<String> {
    info!("Running benchmark harness: {command}");

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .map_err(|e| BenchError::Harness(format!("could not start '{command}': {e}")))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        debug!("Harness stderr:\n{stderr}");
    }

    if !output.status.success() {
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        return Err(BenchError::Harness(format!(
            "'{command}' exited with {}{}",
            output.status,
            if tail.is_empty() {
                String::new()
            } else {
                format!(":\n{}", tail.join("\n"))
            }
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|_| BenchError::Harness(format!("'{command}' printed non UTF-8 output")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_reads_output_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "test a ... bench: 1 ns/iter (+/- 0)\n").unwrap();

        let output = collect(&HarnessSource::File(temp_file.path().to_path_buf()))
            .await
            .unwrap();
        assert!(output.contains("bench: 1 ns/iter"));
    }

    #[tokio::test]
    async fn test_missing_output_file_is_io_error() {
        let err = collect(&HarnessSource::File(PathBuf::from("/nonexistent/out.txt")))
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::Io(_)));
    }

    #[tokio::test]
    async fn test_captures_command_stdout() {
        let output = collect(&HarnessSource::Command("echo hello; echo noise >&2".into()))
            .await
            .unwrap();
        assert_eq!(output, "hello\n");
    }

    #[tokio::test]
    async fn test_failing_command_is_harness_error() {
        let err = collect(&HarnessSource::Command("echo broken >&2; exit 3".into()))
            .await
            .unwrap_err();
        assert!(matches!(&err, BenchError::Harness(message) if message.contains("broken")));
    }
}
