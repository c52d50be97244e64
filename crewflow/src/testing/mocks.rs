//! Scripted collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient};
use crate::reasoning::{ReasoningOutput, ReasoningRequest, ReasoningService};
use crate::search::{SearchHit, SearchTool};

type Scripted<T> = Result<T, ProviderError>;

/// A reasoning service that replays scripted replies per stage and records
/// every request it receives.
///
/// When a stage's script runs dry the service answers with
/// [`ProviderError::Other`], so a test that makes an unexpected call fails
/// loudly instead of hanging.
#[derive(Debug, Default)]
pub struct ScriptedReasoningService {
    scripts: Mutex<HashMap<String, VecDeque<Scripted<String>>>>,
    requests: Mutex<Vec<ReasoningRequest>>,
    delay: Option<Duration>,
}

impl ScriptedReasoningService {
    /// Creates a service with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply for `stage`.
    #[must_use]
    pub fn reply(self, stage: impl Into<String>, text: impl Into<String>) -> Self {
        self.push(stage.into(), Ok(text.into()));
        self
    }

    /// Queues an error for `stage`.
    #[must_use]
    pub fn fail(self, stage: impl Into<String>, error: ProviderError) -> Self {
        self.push(stage.into(), Err(error));
        self
    }

    /// Sleeps this long before every reply.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, stage: String, reply: Scripted<String>) {
        self.scripts.lock().entry(stage).or_default().push_back(reply);
    }

    /// Returns every request received, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().clone()
    }

    /// Returns the stage names called, in call order.
    #[must_use]
    pub fn called_stages(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.stage.clone()).collect()
    }

    /// Returns how many times `stage` was called.
    #[must_use]
    pub fn call_count(&self, stage: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.stage == stage).count()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoningService {
    async fn reason(&self, request: &ReasoningRequest) -> Result<ReasoningOutput, ProviderError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .scripts
            .lock()
            .get_mut(&request.stage)
            .and_then(VecDeque::pop_front);

        match next {
            Some(reply) => reply.map(ReasoningOutput::text),
            None => Err(ProviderError::other(format!(
                "no scripted reply left for stage '{}'",
                request.stage
            ))),
        }
    }
}

/// An LLM client that replays scripted completions in order.
#[derive(Debug)]
pub struct ScriptedLlm {
    model: String,
    replies: Mutex<VecDeque<Scripted<CompletionResponse>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLlm {
    /// Creates a client with no replies.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: "scripted".to_string(),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a text reply.
    #[must_use]
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(CompletionResponse {
            text: text.into(),
            ..CompletionResponse::default()
        }));
        self
    }

    /// Queues an error.
    #[must_use]
    pub fn fail(self, error: ProviderError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// Returns every request received, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::other("no scripted completion left")))
    }
}

/// A search tool that returns the same hits for every query.
#[derive(Debug, Default)]
pub struct StaticSearch {
    hits: Vec<SearchHit>,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    /// Creates a search tool returning `hits`.
    #[must_use]
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Returns every query received.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchTool for StaticSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        self.queries.lock().push(query.to_string());
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::Capability;

    fn request(stage: &str) -> ReasoningRequest {
        ReasoningRequest {
            stage: stage.to_string(),
            role: String::new(),
            goal: String::new(),
            backstory: String::new(),
            instruction: "do it".to_string(),
            expected_output: String::new(),
            capability: Some(Capability::web_search()),
            max_iterations: None,
        }
    }

    #[tokio::test]
    async fn test_scripted_reasoning_replays_per_stage() {
        let service = ScriptedReasoningService::new()
            .reply("a", "first")
            .fail("a", ProviderError::transport("reset"))
            .reply("b", "other");

        assert_eq!(service.reason(&request("a")).await.unwrap().text, "first");
        assert_eq!(service.reason(&request("b")).await.unwrap().text, "other");
        assert!(service.reason(&request("a")).await.is_err());
        assert!(service.reason(&request("a")).await.unwrap_err().to_string().contains("no scripted reply"));

        assert_eq!(service.called_stages(), vec!["a", "b", "a", "a"]);
        assert_eq!(service.call_count("a"), 3);
    }

    #[test]
    fn test_scripted_llm_and_static_search() {
        tokio_test::block_on(async {
            let llm = ScriptedLlm::new().reply("hello");
            let resp = tokio_test::assert_ok!(llm.complete(&CompletionRequest::default()).await);
            assert_eq!(resp.text, "hello");
            tokio_test::assert_err!(llm.complete(&CompletionRequest::default()).await);
            assert_eq!(llm.requests().len(), 2);

            let search = StaticSearch::new(vec![
                SearchHit::new("a", "https://a", "", 1),
                SearchHit::new("b", "https://b", "", 2),
            ]);
            assert_eq!(tokio_test::assert_ok!(search.search("q", 1).await).len(), 1);
            assert_eq!(search.queries(), vec!["q"]);
        });
    }
}
