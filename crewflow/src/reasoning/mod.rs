//! The reasoning service seam.
//!
//! The pipeline runner knows nothing about models or search. It hands each
//! stage to a [`ReasoningService`] as a [`ReasoningRequest`] and gets text
//! back. [`AgentExecutor`] is the production implementation.

mod agent;

pub use agent::AgentExecutor;

use crate::errors::ProviderError;
use crate::llm::TokenUsage;
use crate::stages::{Capability, Stage, StageResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Heading of the block that carries earlier stage outputs.
pub const CONTEXT_HEADING: &str = "Context from previous tasks:";

/// Everything the reasoning service needs to run one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningRequest {
    /// Name of the stage being run.
    pub stage: String,
    /// Persona role.
    pub role: String,
    /// Persona goal.
    pub goal: String,
    /// Persona backstory.
    pub backstory: String,
    /// Instruction with the previous-results context appended.
    pub instruction: String,
    /// Expected output descriptor.
    pub expected_output: String,
    /// Optional capability requirement.
    pub capability: Option<Capability>,
    /// Iteration cap for the tool loop.
    pub max_iterations: Option<usize>,
}

impl ReasoningRequest {
    /// Builds the request for `stage`, given every result recorded so far.
    ///
    /// Results are appended in pipeline order under [`CONTEXT_HEADING`].
    /// Failed results never reach this point because a failure ends the run.
    #[must_use]
    pub fn for_stage(stage: &Stage, previous: &[StageResult]) -> Self {
        let mut instruction = stage.instruction.clone();
        if !previous.is_empty() {
            let _ = write!(instruction, "\n\n{CONTEXT_HEADING}\n");
            for result in previous {
                let _ = write!(instruction, "\n[{}]\n{}\n", result.stage, result.text);
            }
        }

        Self {
            stage: stage.name.clone(),
            role: stage.role.clone(),
            goal: stage.goal.clone(),
            backstory: stage.backstory.clone(),
            instruction,
            expected_output: stage.expected_output.clone(),
            capability: stage.capability,
            max_iterations: stage.budget.max_iterations,
        }
    }

    /// Returns the search result cap when the stage may search.
    #[must_use]
    pub fn search_limit(&self) -> Option<usize> {
        match self.capability {
            Some(Capability::WebSearch { max_results }) => Some(max_results),
            None => None,
        }
    }
}

/// What the reasoning service produced for one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasoningOutput {
    /// The stage's final text.
    pub text: String,
    /// Tokens spent producing it.
    pub usage: TokenUsage,
}

impl ReasoningOutput {
    /// Output with no usage information.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
        }
    }
}

/// External reasoning service: one call per stage attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Runs the stage and returns its text.
    async fn reason(&self, request: &ReasoningRequest) -> Result<ReasoningOutput, ProviderError>;
}
