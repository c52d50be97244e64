//! Pipeline building and execution.
//!
//! This module provides:
//! - [`PipelineBuilder`], which validates an ordered list of stage templates
//! - [`PipelineRunner`], which runs the stages one after another
//! - Retry schedules for transient provider errors

mod builder;
mod context;
mod retry;
mod runner;


pub use builder::{resolve_topic, Pipeline, PipelineBuilder, TOPIC_KEY};
pub use context::{RunContext, RunReport};
pub use retry::{
    should_retry, BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision, RetryState,
};
pub use runner::PipelineRunner;
