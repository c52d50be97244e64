//! Gemini `generateContent` client.

use super::{
    classify_http_error, provider_model_name, CompletionRequest, CompletionResponse, LlmClient,
    LlmConfig, ReasoningEffort, Role, TokenUsage,
};
use crate::credentials::Secret;
use crate::errors::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// LLM client for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Secret,
    model: String,
    temperature: f32,
    reasoning_effort: Option<ReasoningEffort>,
    base_url: String,
}

impl GeminiClient {
    /// Creates a client from the LLM settings and an API key.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, api_key: Secret) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model: provider_model_name(&config.model).to_string(),
            temperature: config.temperature,
            reasoning_effort: config.reasoning_effort,
            base_url: API_BASE.to_string(),
        })
    }

    /// Points the client at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_body<'a>(&self, request: &'a CompletionRequest) -> ApiRequest<'a> {
        ApiRequest {
            system_instruction: (!request.system.is_empty()).then(|| ApiContent {
                role: None,
                parts: vec![ApiPart {
                    text: &request.system,
                }],
            }),
            contents: request
                .messages
                .iter()
                .map(|m| ApiContent {
                    role: Some(match m.role {
                        Role::User => "user",
                        Role::Model => "model",
                    }),
                    parts: vec![ApiPart { text: &m.content }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: self.temperature,
                thinking_config: self.reasoning_effort.map(|effort| ThinkingConfig {
                    thinking_level: effort.as_str(),
                }),
            },
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        debug!(model = %self.model, turns = request.messages.len(), "Calling Gemini");

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_http_error(status.as_u16(), &body, &self.model));
        }

        parse_response(&body)
    }
}

/// Decodes a `generateContent` response body.
pub(crate) fn parse_response(body: &str) -> Result<CompletionResponse, ProviderError> {
    let api: ApiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::malformed(format!("undecodable Gemini response: {e}")))?;

    let candidate = api
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::malformed("Gemini response has no candidates"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(ProviderError::malformed(format!(
            "Gemini returned an empty response (finish reason: {reason})"
        )));
    }

    Ok(CompletionResponse {
        text,
        usage: api.usage_metadata.map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        }),
        finish_reason: candidate.finish_reason,
    })
}

// --- API types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent<'a>>,
    contents: Vec<ApiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct ApiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<ApiPart<'a>>,
}

#[derive(Serialize)]
struct ApiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_level: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}
