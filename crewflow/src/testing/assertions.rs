//! Test assertions for run reports and errors.

use crate::errors::CrewError;
use crate::pipeline::RunReport;
use crate::reasoning::{ReasoningRequest, CONTEXT_HEADING};

/// Asserts that the report's stages ran in exactly this order.
pub fn assert_stage_order(report: &RunReport, expected: &[&str]) {
    let actual: Vec<&str> = report.results.iter().map(|r| r.stage.as_str()).collect();
    assert_eq!(
        actual, expected,
        "Expected stages {expected:?}, got {actual:?}"
    );
}

/// Asserts that the final output is exactly the last stage's text.
pub fn assert_final_output_is_last(report: &RunReport) {
    let last = report.results.last().map(|r| r.text.as_str());
    assert_eq!(
        Some(report.final_output.as_str()),
        last,
        "Final output does not match the last stage's text"
    );
}

/// Asserts that the run failed in `stage`.
pub fn assert_failed_at(result: &Result<RunReport, CrewError>, stage: &str) {
    match result {
        Ok(report) => panic!("Expected failure in stage '{stage}', but the run succeeded: {report:?}"),
        Err(err) => assert_eq!(
            err.failing_stage(),
            Some(stage),
            "Expected failure in stage '{stage}', got: {err}"
        ),
    }
}

/// Asserts that `request` carries `text` from `stage` in its context block.
pub fn assert_context_contains(request: &ReasoningRequest, stage: &str, text: &str) {
    let Some((_, context)) = request.instruction.split_once(CONTEXT_HEADING) else {
        panic!(
            "Expected a context block in the request for '{}', got: {}",
            request.stage, request.instruction
        );
    };
    let entry = format!("[{stage}]\n{text}\n");
    assert!(
        context.contains(&entry),
        "Expected context of '{}' to contain {entry:?}, got: {context}",
        request.stage
    );
}
