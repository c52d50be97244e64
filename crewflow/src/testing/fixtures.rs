//! Ready-made pipelines for tests and benches.

use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::stages::{research_crew, Capability, StageBudget, StageTemplate};

/// The stock research crew, with search, and the given budget.
///
/// # Panics
///
/// Never: the stock crew always validates.
#[must_use]
#[allow(clippy::expect_used)]
pub fn crew_pipeline(budget: StageBudget) -> Pipeline {
    PipelineBuilder::new("research-crew")
        .stages(research_crew(Some(Capability::web_search()), budget))
        .and_then(PipelineBuilder::build)
        .expect("stock crew is valid")
}

/// A pipeline of `names`, each instructed to "Handle {topic} in <name>".
///
/// # Panics
///
/// Panics if `names` is empty or contains duplicates.
#[must_use]
#[allow(clippy::expect_used)]
pub fn named_pipeline(names: &[&str], budget: StageBudget) -> Pipeline {
    PipelineBuilder::new("test")
        .stages(
            names
                .iter()
                .map(|n| StageTemplate::new(*n, format!("Handle {{topic}} in {n}.")).with_budget(budget)),
        )
        .and_then(PipelineBuilder::build)
        .expect("test pipeline is valid")
}
