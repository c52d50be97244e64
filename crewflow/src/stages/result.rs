//! Stage result type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The recorded outcome of one stage. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name.
    pub stage: String,
    /// Text produced by the reasoning service (empty on failure).
    pub text: String,
    /// Whether the stage succeeded.
    pub success: bool,
    /// How many times the stage was retried.
    pub retries: usize,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
    /// Error message if failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageResult {
    /// Creates a completed stage result.
    #[must_use]
    pub fn completed(
        stage: impl Into<String>,
        text: impl Into<String>,
        retries: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stage: stage.into(),
            text: text.into(),
            success: true,
            retries,
            started_at,
            ended_at: Utc::now(),
            error: None,
        }
    }

    /// Creates a failed stage result.
    #[must_use]
    pub fn failed(
        stage: impl Into<String>,
        error: impl Into<String>,
        retries: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stage: stage.into(),
            text: String::new(),
            success: false,
            retries,
            started_at,
            ended_at: Utc::now(),
            error: Some(error.into()),
        }
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_ms(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_result_completed() {
        let result = StageResult::completed("research", "5 facts", 1, Utc::now());

        assert_eq!(result.stage, "research");
        assert_eq!(result.text, "5 facts");
        assert!(result.success);
        assert_eq!(result.retries, 1);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_stage_result_failed() {
        let result = StageResult::failed("research", "quota", 0, Utc::now());

        assert!(!result.success);
        assert!(result.text.is_empty());
        assert_eq!(result.error, Some("quota".to_string()));
    }

    #[test]
    fn test_stage_result_duration() {
        let started = Utc::now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let result = StageResult::completed("test", "", 0, started);

        assert!(result.duration_ms() >= 10.0);
    }

    #[test]
    fn test_stage_result_serialization_skips_empty_error() {
        let result = StageResult::completed("test", "text", 0, Utc::now());
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("error"));

        let back: StageResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
