//! Error types for the crewflow framework.
//!
//! The taxonomy follows how a research run can go wrong:
//!
//! - [`ConfigError`]: missing credentials or invalid settings, detected
//!   before any external call is made.
//! - [`ProviderError`]: the reasoning service or search capability refused
//!   or failed a request (auth, quota, unknown model, rate limit, ...).
//! - [`StageFailure`]: a provider error attributed to the stage it broke.
//! - [`PipelineValidationError`]: a malformed pipeline or template.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// The main error type for crewflow operations.
#[derive(Debug, Error)]
pub enum CrewError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A pipeline or template validation error occurred.
    #[error(transparent)]
    Validation(#[from] PipelineValidationError),

    /// A stage failed and the run was aborted.
    #[error(transparent)]
    Stage(#[from] StageFailure),

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CrewError {
    /// Returns the name of the failing stage, if the error came from one.
    #[must_use]
    pub fn failing_stage(&self) -> Option<&str> {
        match self {
            Self::Stage(failure) => Some(&failure.stage),
            _ => None,
        }
    }

    /// Returns true if the underlying cause is an exhausted provider quota.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::Stage(failure) if failure.source.is_quota_exceeded())
    }

    /// Returns true for errors raised before any external call was made.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Validation(_))
    }
}

/// Configuration errors: reported immediately, before the pipeline starts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required credential is absent or blank.
    #[error("Missing credential '{key}': set the {env_var} environment variable")]
    MissingCredential {
        /// Logical credential name (e.g. "llm_api_key").
        key: String,
        /// Environment variable that was consulted.
        env_var: String,
    },

    /// A configuration value is out of range or malformed.
    #[error("Invalid configuration for '{field}': {reason}")]
    Invalid {
        /// The offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    /// Creates a missing credential error.
    #[must_use]
    pub fn missing_credential(key: impl Into<String>, env_var: impl Into<String>) -> Self {
        Self::MissingCredential {
            key: key.into(),
            env_var: env_var.into(),
        }
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the reasoning service and its collaborators.
///
/// The raw provider message is always kept so callers can show it verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Credentials were rejected.
    #[error("Authentication failed: {message}")]
    Auth {
        /// Raw provider message.
        message: String,
    },

    /// The account quota is exhausted.
    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        /// Raw provider message.
        message: String,
    },

    /// The provider asked us to slow down.
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Raw provider message.
        message: String,
    },

    /// The requested model identifier does not exist.
    #[error("Unknown model '{model}': {message}")]
    UnknownModel {
        /// The model that was requested.
        model: String,
        /// Raw provider message.
        message: String,
    },

    /// The provider answered with something we could not decode.
    #[error("Malformed response: {message}")]
    Malformed {
        /// Description of the decoding problem.
        message: String,
    },

    /// The provider reported an internal error (5xx).
    #[error("Provider error (status {status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Raw provider message.
        message: String,
    },

    /// The request never reached the provider or the connection dropped.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The agent loop used up its iteration cap without an answer.
    #[error("Iteration limit of {limit} reached without a final answer")]
    IterationLimit {
        /// The configured cap.
        limit: usize,
    },

    /// The stage's wall-clock budget elapsed.
    #[error("Time budget of {}s exceeded", .budget.as_secs_f64())]
    TimeBudgetExceeded {
        /// The configured budget.
        budget: Duration,
    },

    /// Any other provider-side failure.
    #[error("{message}")]
    Other {
        /// Raw provider message.
        message: String,
    },
}

impl ProviderError {
    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a generic provider error.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// Quota, auth, unknown model and malformed responses are final; so are
    /// exhausted iteration and time budgets.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Transport { .. }
        )
    }

    /// Returns true if the provider quota is exhausted.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// Short machine-readable kind, used in events and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::RateLimited { .. } => "rate_limited",
            Self::UnknownModel { .. } => "unknown_model",
            Self::Malformed { .. } => "malformed",
            Self::Server { .. } => "server",
            Self::Transport { .. } => "transport",
            Self::IterationLimit { .. } => "iteration_limit",
            Self::TimeBudgetExceeded { .. } => "time_budget",
            Self::Other { .. } => "other",
        }
    }
}

/// A stage failure: the provider error plus the stage it is attributed to.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' failed after {retries} retries")]
pub struct StageFailure {
    /// Name of the failing stage.
    pub stage: String,
    /// Zero-based position of the stage in the pipeline.
    pub index: usize,
    /// How many times the stage was retried before giving up.
    pub retries: usize,
    /// The underlying provider error.
    #[source]
    pub source: ProviderError,
}

impl StageFailure {
    /// Creates a new stage failure.
    #[must_use]
    pub fn new(stage: impl Into<String>, index: usize, retries: usize, source: ProviderError) -> Self {
        Self {
            stage: stage.into(),
            index,
            retries,
            source,
        }
    }
}

/// Metadata about a validation error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PIPELINE-EMPTY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when pipeline or template validation fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "my_stage");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.summary, "Test error");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"my_stage".to_string()));
    }

    #[test]
    fn test_validation_error_code() {
        let err = PipelineValidationError::new("empty")
            .with_error_info(ContractErrorInfo::new("PIPELINE-EMPTY", "no stages"));
        assert_eq!(err.code(), Some("PIPELINE-EMPTY"));
        assert_eq!(PipelineValidationError::new("x").code(), None);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::RateLimited { message: "slow down".into() }.is_retryable());
        assert!(ProviderError::Server { status: 503, message: "busy".into() }.is_retryable());
        assert!(ProviderError::transport("reset").is_retryable());

        assert!(!ProviderError::QuotaExceeded { message: "quota".into() }.is_retryable());
        assert!(!ProviderError::Auth { message: "bad key".into() }.is_retryable());
        assert!(!ProviderError::malformed("garbage").is_retryable());
        assert!(!ProviderError::IterationLimit { limit: 3 }.is_retryable());
        assert!(!ProviderError::TimeBudgetExceeded { budget: Duration::from_secs(1) }.is_retryable());
    }

    #[test]
    fn test_stage_failure_display_names_stage() {
        let failure = StageFailure::new(
            "research",
            0,
            2,
            ProviderError::QuotaExceeded { message: "daily limit".into() },
        );
        assert_eq!(failure.to_string(), "Stage 'research' failed after 2 retries");
        let cause = std::error::Error::source(&failure).map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("Quota exceeded: daily limit"));

        // Wrapping adds no text of its own.
        let wrapped = CrewError::from(failure.clone());
        assert_eq!(wrapped.to_string(), failure.to_string());
    }

    #[test]
    fn test_crew_error_quota_detection() {
        let err = CrewError::from(StageFailure::new(
            "research",
            0,
            0,
            ProviderError::QuotaExceeded { message: "limit".into() },
        ));
        assert!(err.is_quota_exceeded());
        assert_eq!(err.failing_stage(), Some("research"));
        assert!(!err.is_configuration());

        let err = CrewError::from(ConfigError::missing_credential("llm_api_key", "GEMINI_API_KEY"));
        assert!(!err.is_quota_exceeded());
        assert!(err.is_configuration());
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_provider_error_kind() {
        assert_eq!(ProviderError::Auth { message: String::new() }.kind(), "auth");
        assert_eq!(ProviderError::IterationLimit { limit: 1 }.kind(), "iteration_limit");
    }
}
