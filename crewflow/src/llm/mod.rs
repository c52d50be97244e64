//! LLM client abstraction.
//!
//! [`LlmClient`] is a single request/response call: system prompt plus a
//! conversation in, text out. The agent loop in [`crate::reasoning`] is
//! built on top of it.

#[cfg(feature = "http")]
mod gemini;

#[cfg(feature = "http")]
pub use gemini::GeminiClient;

use crate::errors::{ConfigError, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use std::time::Duration;

/// Default model, in `provider/model` form.
pub const DEFAULT_MODEL: &str = "gemini/gemini-3-flash-preview";

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller (instructions, observations).
    User,
    /// The model's own earlier replies.
    Model,
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Turn author.
    pub role: Role,
    /// Turn text.
    pub content: String,
}

impl Message {
    /// A user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A model turn.
    #[must_use]
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// A completion request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionRequest {
    /// System instruction.
    pub system: String,
    /// Conversation so far, oldest first.
    pub messages: Vec<Message>,
}

/// Token usage from a single LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Generated tokens.
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Total tokens (input + output).
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// A completion response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionResponse {
    /// Generated text.
    pub text: String,
    /// Token usage, when the provider reports it.
    pub usage: Option<TokenUsage>,
    /// Why generation stopped, when reported.
    pub finish_reason: Option<String>,
}

/// The borrowed brain: one synchronous-looking call to a model provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// The model identifier this client talks to.
    fn model(&self) -> &str;

    /// Sends the request and returns the generated text.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}

/// How hard the model should think before answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Minimal deliberation.
    Low,
    /// Balanced.
    Medium,
    /// Maximum deliberation.
    High,
}

impl ReasoningEffort {
    /// Lowercase name, as sent to the provider.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for ReasoningEffort {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ConfigError::invalid(
                "llm.reasoning_effort",
                format!("expected low, medium or high, got '{other}'"),
            )),
        }
    }
}

/// Model selection and sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier, optionally prefixed with `gemini/`.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Reasoning effort; `"none"` leaves it to the provider.
    #[serde(default = "default_reasoning_effort", with = "effort_opt")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: f64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

const fn default_temperature() -> f32 {
    1.0
}

const fn default_reasoning_effort() -> Option<ReasoningEffort> {
    Some(ReasoningEffort::High)
}

const fn default_request_timeout() -> f64 {
    60.0
}

mod effort_opt {
    use super::ReasoningEffort;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<ReasoningEffort>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.map_or("none", |e| e.as_str()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ReasoningEffort>, D::Error> {
        let raw = String::deserialize(d)?;
        if raw.trim().eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(serde::de::Error::custom)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            reasoning_effort: default_reasoning_effort(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl LlmConfig {
    /// Validates ranges.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty model, a temperature outside `0..=2`
    /// or a non-positive timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if provider_model_name(&self.model).is_empty() {
            return Err(ConfigError::invalid("llm.model", "model name cannot be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::invalid(
                "llm.temperature",
                format!("must be between 0 and 2, got {}", self.temperature),
            ));
        }
        let timeout_ok = self.request_timeout_seconds > 0.0
            && Duration::try_from_secs_f64(self.request_timeout_seconds).is_ok();
        if !timeout_ok {
            return Err(ConfigError::invalid(
                "llm.request_timeout_seconds",
                "must be a positive number of seconds",
            ));
        }
        Ok(())
    }

    /// The request timeout, saturating at [`Duration::MAX`] for values
    /// [`LlmConfig::validate`] would reject.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_timeout_seconds).unwrap_or(Duration::MAX)
    }
}

/// Strips a `gemini/` (or `google/`) routing prefix from a model string.
#[must_use]
pub fn provider_model_name(model: &str) -> &str {
    let model = model.trim();
    model
        .strip_prefix("gemini/")
        .or_else(|| model.strip_prefix("google/"))
        .unwrap_or(model)
        .trim()
}

/// Maps an HTTP failure to a [`ProviderError`], keeping the raw message.
#[must_use]
pub fn classify_http_error(status: u16, body: &str, model: &str) -> ProviderError {
    let message = provider_message(body);
    let lowered = body.to_ascii_lowercase();

    match status {
        401 | 403 => ProviderError::Auth { message },
        404 => ProviderError::UnknownModel {
            model: model.to_string(),
            message,
        },
        429 if lowered.contains("quota") || lowered.contains("resource_exhausted") => {
            ProviderError::QuotaExceeded { message }
        }
        429 => ProviderError::RateLimited { message },
        400 if lowered.contains("api key not valid") || lowered.contains("api_key_invalid") => {
            ProviderError::Auth { message }
        }
        400 if lowered.contains("model") && lowered.contains("not found") => {
            ProviderError::UnknownModel {
                model: model.to_string(),
                message,
            }
        }
        500..=599 => ProviderError::Server { status, message },
        _ => ProviderError::Other {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

/// Pulls `error.message` out of a JSON error body, or returns the body.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(ToString::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}
