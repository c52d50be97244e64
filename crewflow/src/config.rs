//! Crew configuration.
//!
//! Every field has a default, so an empty TOML file is a valid config. The
//! CLI loads the file first and then applies its flags on top.

use crate::credentials::CredentialEnv;
use crate::errors::{ConfigError, CrewError, PipelineValidationError};
use crate::filler::FillerConfig;
use crate::llm::LlmConfig;
use crate::pipeline::{Pipeline, PipelineBuilder, RetryConfig};
use crate::search::SearchConfig;
use crate::stages::{research_crew, Capability, StageBudget, DEFAULT_TOPIC};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Per-stage bounds as written in the config file.
///
/// Zero means "no cap" for both `max_iterations` and `time_budget_seconds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Reasoning iterations per stage.
    pub max_iterations: usize,
    /// Wall-clock seconds per stage, retries included.
    pub time_budget_seconds: f64,
    /// Retries for transient provider errors.
    pub max_retries: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            time_budget_seconds: 120.0,
            max_retries: 2,
        }
    }
}

impl BudgetConfig {
    /// Converts to the runtime budget.
    #[must_use]
    pub fn to_stage_budget(&self) -> StageBudget {
        StageBudget {
            max_iterations: (self.max_iterations > 0).then_some(self.max_iterations),
            time_budget: (self.time_budget_seconds > 0.0).then(|| {
                Duration::try_from_secs_f64(self.time_budget_seconds).unwrap_or(Duration::MAX)
            }),
            max_retries: self.max_retries,
        }
    }

    /// Validates ranges.
    ///
    /// # Errors
    ///
    /// Returns an error for a negative, non-finite or unrepresentable time
    /// budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if Duration::try_from_secs_f64(self.time_budget_seconds).is_err() {
            return Err(ConfigError::invalid(
                "budget.time_budget_seconds",
                "must be zero (no budget) or a positive number of seconds",
            ));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewConfig {
    /// Topic used when the user leaves it blank.
    pub default_topic: String,
    /// Model settings.
    pub llm: LlmConfig,
    /// Search settings.
    pub search: SearchConfig,
    /// Per-stage bounds.
    pub budget: BudgetConfig,
    /// Delay schedule between retries.
    pub retry: RetryConfig,
    /// Console filler settings.
    pub filler: FillerConfig,
    /// Where credentials are read from.
    pub credentials: CredentialEnv,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            default_topic: DEFAULT_TOPIC.to_string(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            budget: BudgetConfig::default(),
            retry: RetryConfig::default(),
            filler: FillerConfig::default(),
            credentials: CredentialEnv::default(),
        }
    }
}

impl CrewConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown values.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or a parse error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CrewError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::from_toml_str(&text)?)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_topic.trim().is_empty() {
            return Err(ConfigError::invalid("default_topic", "cannot be blank"));
        }
        self.llm.validate()?;
        self.search.validate()?;
        self.budget.validate()?;
        self.filler.validate()?;
        Ok(())
    }

    /// Returns true if any stage of the crew will need web search.
    #[must_use]
    pub const fn requires_search(&self) -> bool {
        self.search.enabled
    }

    /// Builds the research crew pipeline described by this config.
    ///
    /// # Errors
    ///
    /// Returns an error if the default topic is blank.
    pub fn crew_pipeline(&self) -> Result<Pipeline, PipelineValidationError> {
        let capability = self.search.enabled.then_some(Capability::WebSearch {
            max_results: self.search.max_results,
        });

        PipelineBuilder::new("research-crew")
            .stages(research_crew(capability, self.budget.to_stage_budget()))?
            .default_topic(&self.default_topic)
            .build()
    }
}
