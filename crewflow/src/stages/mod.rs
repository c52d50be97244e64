//! Stage definitions.
//!
//! A [`StageTemplate`] is what a crew is configured with: prompt templates
//! parameterized by run inputs such as `{topic}`. Rendering a template with
//! the inputs of one run yields an immutable [`Stage`], which is what the
//! pipeline runner actually executes.

mod crew;
mod result;
mod template;

pub use crew::{research_crew, DEFAULT_TOPIC};
pub use result::StageResult;
pub use template::{placeholders, render_template, StageTemplate};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of search results a stage may request.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// An external capability a stage needs from the reasoning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Capability {
    /// The stage may query the web.
    WebSearch {
        /// Upper bound on results returned per query.
        max_results: usize,
    },
}

impl Capability {
    /// Web search with the default result cap.
    #[must_use]
    pub const fn web_search() -> Self {
        Self::WebSearch {
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Returns true if this is the web search capability.
    #[must_use]
    pub const fn is_web_search(&self) -> bool {
        matches!(self, Self::WebSearch { .. })
    }
}

/// Iteration, time and retry bounds for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBudget {
    /// Maximum reasoning iterations; `None` leaves the loop unbounded.
    pub max_iterations: Option<usize>,
    /// Wall-clock budget for the whole stage, retries included.
    #[serde(default, with = "duration_secs_opt")]
    pub time_budget: Option<Duration>,
    /// Retries allowed for transient provider errors.
    pub max_retries: usize,
}

impl Default for StageBudget {
    fn default() -> Self {
        Self {
            max_iterations: Some(3),
            time_budget: Some(Duration::from_secs(120)),
            max_retries: 2,
        }
    }
}

impl StageBudget {
    /// Creates a budget with no caps at all.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_iterations: None,
            time_budget: None,
            max_retries: 0,
        }
    }

    /// Sets the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub const fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget = budget;
        self
    }

    /// Sets the transient retry count.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }
}

/// A fully rendered stage, ready to run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Unique stage name within the pipeline.
    pub name: String,
    /// Persona the reasoning service should adopt.
    pub role: String,
    /// What the persona is trying to achieve.
    pub goal: String,
    /// Background that shapes the persona's voice.
    pub backstory: String,
    /// The rendered instruction.
    pub instruction: String,
    /// What the output should look like.
    pub expected_output: String,
    /// Optional external capability.
    pub capability: Option<Capability>,
    /// Iteration and time bounds.
    pub budget: StageBudget,
}

impl Stage {
    /// Returns true if the stage needs web search.
    #[must_use]
    pub fn needs_search(&self) -> bool {
        self.capability.is_some_and(|c| c.is_web_search())
    }
}

mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<f64> = Option::deserialize(d)?;
        secs.map(|s| {
            if s.is_finite() && s >= 0.0 {
                Ok(Duration::from_secs_f64(s))
            } else {
                Err(serde::de::Error::custom("time budget must be a non-negative number of seconds"))
            }
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_default_results() {
        assert_eq!(
            Capability::web_search(),
            Capability::WebSearch { max_results: 5 }
        );
        assert!(Capability::web_search().is_web_search());
    }

    #[test]
    fn test_budget_builders() {
        let budget = StageBudget::unbounded()
            .with_max_iterations(Some(2))
            .with_time_budget(Some(Duration::from_secs(5)))
            .with_max_retries(1);

        assert_eq!(budget.max_iterations, Some(2));
        assert_eq!(budget.time_budget, Some(Duration::from_secs(5)));
        assert_eq!(budget.max_retries, 1);
    }

    #[test]
    fn test_budget_toml_roundtrip_of_seconds() {
        let budget: StageBudget =
            toml::from_str("max_iterations = 4\ntime_budget = 1.5\nmax_retries = 0").unwrap();
        assert_eq!(budget.max_iterations, Some(4));
        assert_eq!(budget.time_budget, Some(Duration::from_millis(1500)));

        let budget: StageBudget = toml::from_str("max_retries = 0").unwrap();
        assert_eq!(budget.max_iterations, None);
        assert_eq!(budget.time_budget, None);
    }

    #[test]
    fn test_negative_time_budget_rejected() {
        let result: Result<StageBudget, _> = toml::from_str("time_budget = -1.0\nmax_retries = 0");
        assert!(result.is_err());
    }
}
