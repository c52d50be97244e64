//! Per-run state and the final report.

use crate::llm::TokenUsage;
use crate::stages::StageResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// State of one pipeline run.
///
/// Results are append-only: once recorded, a stage's result never changes,
/// and results appear in pipeline order.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    topic: String,
    inputs: HashMap<String, String>,
    results: Vec<StageResult>,
    usage: TokenUsage,
}

impl RunContext {
    /// Creates a context with a fresh run id.
    #[must_use]
    pub fn new(topic: impl Into<String>, inputs: HashMap<String, String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            topic: topic.into(),
            inputs,
            results: Vec::new(),
            usage: TokenUsage::default(),
        }
    }

    /// Returns the run id.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the resolved topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the run inputs.
    #[must_use]
    pub const fn inputs(&self) -> &HashMap<String, String> {
        &self.inputs
    }

    /// Returns every recorded result, in pipeline order.
    #[must_use]
    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    /// Looks up a result by stage name.
    #[must_use]
    pub fn result(&self, stage: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage == stage)
    }

    /// Tokens spent so far.
    #[must_use]
    pub const fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub(crate) fn record(&mut self, result: StageResult, usage: TokenUsage) {
        self.usage += usage;
        self.results.push(result);
    }

    pub(crate) fn into_report(self, duration: Duration) -> RunReport {
        let final_output = self.results.last().map(|r| r.text.clone()).unwrap_or_default();
        RunReport {
            run_id: self.run_id,
            topic: self.topic,
            results: self.results,
            final_output,
            usage: self.usage,
            duration,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run id.
    pub run_id: Uuid,
    /// Resolved topic.
    pub topic: String,
    /// Every stage result, in pipeline order.
    pub results: Vec<StageResult>,
    /// Exactly the last stage's text.
    pub final_output: String,
    /// Tokens spent across the run.
    pub usage: TokenUsage,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}
