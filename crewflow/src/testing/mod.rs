//! Testing utilities for crewflow pipelines.
//!
//! This module provides:
//! - Scripted reasoning, LLM and search collaborators
//! - In-memory console input/output for the filler
//! - Assertions and ready-made pipelines

mod assertions;
mod fixtures;
mod io;
mod mocks;

pub use assertions::{
    assert_context_contains, assert_failed_at, assert_final_output_is_last, assert_stage_order,
};
pub use fixtures::{crew_pipeline, named_pipeline};
pub use io::{CaptureBuffer, ChannelInput};
pub use mocks::{ScriptedLlm, ScriptedReasoningService, StaticSearch};
