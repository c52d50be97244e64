//! The stock two-stage research crew: search, then summarize.

use super::{Capability, StageBudget, StageTemplate};

/// Topic used when the caller leaves it blank.
pub const DEFAULT_TOPIC: &str = "AI agents";

/// Builds the research crew.
///
/// `research` gathers facts with web search when `capability` is set;
/// `write` turns them into a short summary using the research as context.
#[must_use]
pub fn research_crew(capability: Option<Capability>, budget: StageBudget) -> Vec<StageTemplate> {
    let mut research = StageTemplate::new(
        "research",
        "Search the internet and find the 5 most important facts about {topic}.",
    )
    .with_agent(
        "Expert Web Researcher",
        "Find the most relevant and up-to-date information about {topic}",
        "You are a master at navigating the web and extracting precise data.",
    )
    .with_expected_output("A bulleted list of 5 key findings with sources.")
    .with_budget(budget);

    if let Some(capability) = capability {
        research = research.with_capability(capability);
    }

    let write = StageTemplate::new(
        "write",
        "Using the research provided, write a 2-paragraph summary about {topic}.",
    )
    .with_agent(
        "Content Specialist",
        "Write a compelling report about {topic}",
        "You transform raw research into beautiful, readable summaries.",
    )
    .with_expected_output("A clean, formatted 2-paragraph summary.")
    .with_budget(budget);

    vec![research, write]
}
