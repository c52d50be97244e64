//! Web search capability.
//!
//! The reasoning service calls a [`SearchTool`] when a stage declares the
//! web search capability. Results are fed back to the model as a numbered
//! observation block.

#[cfg(feature = "http")]
mod serper;

#[cfg(feature = "http")]
pub use serper::SerperSearch;

use crate::errors::{ConfigError, ProviderError};
use crate::stages::DEFAULT_MAX_RESULTS;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Page title.
    pub title: String,
    /// Page URL.
    pub link: String,
    /// Short excerpt.
    #[serde(default)]
    pub snippet: String,
    /// 1-based rank.
    pub position: usize,
}

impl SearchHit {
    /// Creates a hit.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        snippet: impl Into<String>,
        position: usize,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
            position,
        }
    }
}

/// A web search backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchTool: Send + Sync {
    /// Runs a query, returning at most `max_results` hits.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError>;
}

/// Search settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Whether stages may use web search at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Upper bound on results per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

const fn default_enabled() -> bool {
    true
}

const fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_results: default_max_results(),
        }
    }
}

impl SearchConfig {
    /// Validates ranges.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_results` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_results == 0 {
            return Err(ConfigError::invalid("search.max_results", "must be at least 1"));
        }
        Ok(())
    }
}

/// Renders hits as the observation handed back to the model.
#[must_use]
pub fn format_observation(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("Search results for \"{query}\": no results found.");
    }

    let mut out = format!("Search results for \"{query}\":\n");
    for (i, hit) in hits.iter().enumerate() {
        let _ = write!(out, "\n{}. {}\n   {}\n", i + 1, hit.title, hit.link);
        if !hit.snippet.is_empty() {
            let _ = writeln!(out, "   {}", hit.snippet);
        }
    }
    out
}
