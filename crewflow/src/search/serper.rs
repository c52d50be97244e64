//! Serper (Google search) backend.

use super::{SearchHit, SearchTool};
use crate::credentials::Secret;
use crate::errors::ProviderError;
use crate::llm::classify_http_error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const API_URL: &str = "https://google.serper.dev/search";

/// Search tool backed by the Serper API.
#[derive(Debug, Clone)]
pub struct SerperSearch {
    http: reqwest::Client,
    api_key: Secret,
    url: String,
}

impl SerperSearch {
    /// Creates a Serper client.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] if the HTTP client cannot be built.
    pub fn new(api_key: Secret, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            url: API_URL.to_string(),
        })
    }

    /// Overrides the endpoint URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl SearchTool for SerperSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        debug!(query = %query, max_results, "Calling Serper");

        let resp = self
            .http
            .post(&self.url)
            .header("X-API-KEY", self.api_key.expose())
            .json(&ApiRequest {
                q: query,
                num: max_results,
            })
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_http_error(status.as_u16(), &body, "serper"));
        }

        parse_response(&body, max_results)
    }
}

fn parse_response(body: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
    let api: ApiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::malformed(format!("undecodable Serper response: {e}")))?;

    Ok(api
        .organic
        .into_iter()
        .take(max_results)
        .enumerate()
        .map(|(i, r)| SearchHit {
            title: r.title,
            link: r.link,
            snippet: r.snippet.unwrap_or_default(),
            position: r.position.unwrap_or(i + 1),
        })
        .collect())
}

// --- API types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    title: String,
    link: String,
    snippet: Option<String>,
    position: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_response_caps_results() {
        let body = r#"{
            "searchParameters": {"q": "rust"},
            "organic": [
                {"title": "A", "link": "https://a", "snippet": "first", "position": 1},
                {"title": "B", "link": "https://b", "position": 2},
                {"title": "C", "link": "https://c", "snippet": "third", "position": 3}
            ]
        }"#;

        let hits = parse_response(body, 2).unwrap();
        assert_eq!(
            hits,
            vec![
                SearchHit::new("A", "https://a", "first", 1),
                SearchHit::new("B", "https://b", "", 2),
            ]
        );
    }

    #[test]
    fn test_parse_response_without_organic() {
        assert!(parse_response(r#"{"answerBox": {}}"#, 5).unwrap().is_empty());
        assert!(matches!(
            parse_response("not json", 5),
            Err(ProviderError::Malformed { .. })
        ));
    }

    #[test]
    fn test_with_url() {
        let search = SerperSearch::new(Secret::new("k"), Duration::from_secs(5))
            .unwrap()
            .with_url("http://localhost:1/search");
        assert_eq!(search.url, "http://localhost:1/search");
    }
}
