//! # Crewflow
//!
//! Sequential research crews: a fixed list of stages, each handled by an
//! LLM-backed agent with an optional web-search tool, where every stage sees
//! the text produced by the stages before it.
//!
//! Crewflow provides:
//!
//! - **Stage templates**: agent role, goal and instructions parameterized by
//!   run inputs such as `{topic}`
//! - **Sequential execution**: stages run strictly in order, and the first
//!   failure stops the run
//! - **Bounded reasoning**: per-stage iteration caps, time budgets and retries
//!   for transient provider errors
//! - **Event-driven observability**: lifecycle events through an [`events::EventSink`]
//! - **Console filler**: a cancellable guessing game that keeps the user busy
//!   while the crew works
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crewflow::prelude::*;
//!
//! let config = CrewConfig::default();
//! let credentials = Credentials::from_env(&config.credentials, config.requires_search())?;
//! let runner = PipelineRunner::from_config(&config, &credentials)?;
//!
//! let report = runner.run(&config.crew_pipeline()?, "quantum computing").await?;
//! println!("{}", format_report(&report));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod credentials;
pub mod errors;
pub mod events;
pub mod filler;
pub mod llm;
pub mod pipeline;
pub mod reasoning;
pub mod report;
pub mod search;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BudgetConfig, CrewConfig};
    pub use crate::credentials::{CredentialEnv, Credentials, Secret};
    pub use crate::errors::{
        ConfigError, CrewError, PipelineValidationError, ProviderError, StageFailure,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::filler::{FillerConfig, FillerExit, FillerHandle, FillerTask, GuessingGame, StopSignal};
    pub use crate::llm::{LlmClient, LlmConfig, ReasoningEffort, TokenUsage};
    pub use crate::pipeline::{
        Pipeline, PipelineBuilder, PipelineRunner, RetryConfig, RunContext, RunReport,
    };
    pub use crate::reasoning::{AgentExecutor, ReasoningOutput, ReasoningRequest, ReasoningService};
    pub use crate::report::{format_report, format_summary, write_report};
    pub use crate::search::{SearchConfig, SearchHit, SearchTool};
    pub use crate::stages::{
        research_crew, Capability, Stage, StageBudget, StageResult, StageTemplate, DEFAULT_TOPIC,
    };
}
