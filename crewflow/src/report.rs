//! Rendering and persisting the final report.

use crate::pipeline::RunReport;
use std::fmt::Write as _;
use std::path::Path;

const BANNER: &str = "########################";

/// Formats the banner block printed after a successful run.
#[must_use]
pub fn format_report(report: &RunReport) -> String {
    format!(
        "\n\n{BANNER}\n## FINAL REPORT\n{BANNER}\n\n{}",
        report.final_output
    )
}

/// One line per stage with its retries and duration, plus token totals.
#[must_use]
pub fn format_summary(report: &RunReport) -> String {
    let mut out = format!("Run {} on \"{}\"\n", report.run_id, report.topic);
    for result in &report.results {
        let _ = writeln!(
            out,
            "  {:<12} {:>8.0} ms  retries={}",
            result.stage,
            result.duration_ms(),
            result.retries
        );
    }
    let _ = write!(
        out,
        "  tokens: {} in / {} out, total {:.1}s",
        report.usage.input_tokens,
        report.usage.output_tokens,
        report.duration.as_secs_f64()
    );
    out
}

/// Writes the final output to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns an IO error if the file cannot be written.
pub fn write_report(path: impl AsRef<Path>, report: &RunReport) -> std::io::Result<()> {
    let path = path.as_ref();
    std::fs::write(path, &report.final_output)?;
    tracing::info!(path = %path.display(), bytes = report.final_output.len(), "Report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::TokenUsage;
    use crate::stages::StageResult;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use uuid::Uuid;

    fn report() -> RunReport {
        RunReport {
            run_id: Uuid::new_v4(),
            topic: "quantum computing".to_string(),
            results: vec![
                StageResult::completed("research", "- qubits", 0, Utc::now()),
                StageResult::completed("write", "Quantum computers use qubits.", 1, Utc::now()),
            ],
            final_output: "Quantum computers use qubits.".to_string(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            },
            duration: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_format_report_banner() {
        assert_eq!(
            format_report(&report()),
            "\n\n########################\n## FINAL REPORT\n########################\n\nQuantum computers use qubits."
        );
    }

    #[test]
    fn test_format_summary_lists_stages() {
        let summary = format_summary(&report());
        assert!(summary.contains("\"quantum computing\""));
        assert!(summary.contains("research"));
        assert!(summary.contains("retries=1"));
        assert!(summary.contains("10 in / 20 out"));
    }

    #[test]
    fn test_write_report_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        std::fs::write(&path, "old").unwrap();

        write_report(&path, &report()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Quantum computers use qubits.");
    }
}
