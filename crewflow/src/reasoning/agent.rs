//! Agent executor: an LLM client plus an optional search tool.

use super::{ReasoningOutput, ReasoningRequest, ReasoningService};
use crate::errors::ProviderError;
use crate::llm::{CompletionRequest, LlmClient, Message, TokenUsage};
use crate::search::{format_observation, SearchTool};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the search tool as the model sees it.
const SEARCH_TOOL: &str = "web_search";

const FINAL_ANSWER_NUDGE: &str =
    "This is your last step. Do not call any more tools; reply with your final answer now.";

/// One parsed model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// The model wants to search.
    Search { thought: String, query: String },
    /// The model is done.
    Answer { thought: String, answer: String },
    /// The model asked for something we cannot do; told back as an observation.
    Invalid { message: String },
}

/// Runs a stage against an [`LlmClient`], with a bounded search loop when
/// the stage declares the web search capability.
pub struct AgentExecutor {
    llm: Arc<dyn LlmClient>,
    search: Option<Arc<dyn SearchTool>>,
}

impl std::fmt::Debug for AgentExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentExecutor")
            .field("model", &self.llm.model())
            .field("search", &self.search.is_some())
            .finish()
    }
}

impl AgentExecutor {
    /// Creates an executor without search.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, search: None }
    }

    /// Attaches a search tool.
    #[must_use]
    pub fn with_search(mut self, search: Arc<dyn SearchTool>) -> Self {
        self.search = Some(search);
        self
    }

    fn build_system_prompt(request: &ReasoningRequest, with_tools: bool) -> String {
        let mut prompt = format!(
            "You are {}. {}\nYour personal goal is: {}",
            request.role, request.backstory, request.goal
        );

        if with_tools {
            prompt.push_str(
                r#"

You have access to one tool:
- web_search: searches the web. Argument: "query" (string).

## How to respond

You MUST respond with valid JSON in one of two formats:

### To search:
{"thought": "what you still need to find out", "action": {"tool": "web_search", "query": "your search query"}}

### To give the final answer:
{"thought": "why you are done", "answer": "your complete final answer"}

## Rules
- Respond with ONLY the JSON object, no extra text.
- Search results come back as the next user message.
- When you have enough information, use the "answer" format."#,
            );
        }

        prompt
    }

    fn build_task_message(request: &ReasoningRequest) -> String {
        format!(
            "Current task: {}\n\nThis is the expected criteria for your final answer: {}\n\
             You MUST return the actual complete content as the final answer, not a summary.",
            request.instruction, request.expected_output
        )
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        usage: &mut TokenUsage,
    ) -> Result<String, ProviderError> {
        let response = self
            .llm
            .complete(&CompletionRequest {
                system: system.to_string(),
                messages: messages.to_vec(),
            })
            .await?;

        if let Some(u) = response.usage {
            *usage += u;
        }
        Ok(response.text)
    }

    async fn run_tool_loop(
        &self,
        request: &ReasoningRequest,
        search: &dyn SearchTool,
        max_results: usize,
    ) -> Result<ReasoningOutput, ProviderError> {
        let system = Self::build_system_prompt(request, true);
        let mut messages = vec![Message::user(Self::build_task_message(request))];
        let mut usage = TokenUsage::default();
        let mut iteration = 0usize;

        loop {
            if let Some(limit) = request.max_iterations {
                if iteration >= limit {
                    return Err(ProviderError::IterationLimit { limit });
                }
            }
            iteration += 1;

            let text = self.complete(&system, &messages, &mut usage).await?;

            let observation = match parse_step(&text) {
                Step::Answer { thought, answer } => {
                    debug!(stage = %request.stage, iteration, thought = %thought, "Final answer");
                    return Ok(ReasoningOutput { text: answer, usage });
                }
                Step::Search { thought, query } => {
                    info!(stage = %request.stage, iteration, query = %query, "Searching the web");
                    debug!(thought = %thought);
                    let hits = search.search(&query, max_results).await?;
                    format_observation(&query, &hits)
                }
                Step::Invalid { message } => message,
            };

            messages.push(Message::model(text));
            let last_step_next = request.max_iterations.is_some_and(|limit| iteration + 1 == limit);
            messages.push(Message::user(if last_step_next {
                format!("{observation}\n\n{FINAL_ANSWER_NUDGE}")
            } else {
                observation
            }));
        }
    }
}

#[async_trait]
impl ReasoningService for AgentExecutor {
    async fn reason(&self, request: &ReasoningRequest) -> Result<ReasoningOutput, ProviderError> {
        match (request.search_limit(), &self.search) {
            (Some(max_results), Some(search)) => {
                self.run_tool_loop(request, search.as_ref(), max_results).await
            }
            (Some(_), None) => Err(ProviderError::other(format!(
                "stage '{}' needs web search but no search tool is configured",
                request.stage
            ))),
            (None, _) => {
                if request.max_iterations == Some(0) {
                    return Err(ProviderError::IterationLimit { limit: 0 });
                }
                let system = Self::build_system_prompt(request, false);
                let messages = [Message::user(Self::build_task_message(request))];
                let mut usage = TokenUsage::default();
                let text = self.complete(&system, &messages, &mut usage).await?;
                Ok(ReasoningOutput { text, usage })
            }
        }
    }
}

/// Parses a reply. Anything that is not a JSON step counts as the answer.
fn parse_step(text: &str) -> Step {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(extract_json(text)) else {
        return Step::Answer {
            thought: String::new(),
            answer: text.to_string(),
        };
    };

    let thought = value
        .get("thought")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    if let Some(answer) = value.get("answer") {
        let answer = match answer {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Step::Answer { thought, answer };
    }

    if let Some(action) = value.get("action") {
        let tool = action.get("tool").and_then(|t| t.as_str()).unwrap_or("");
        if tool != SEARCH_TOOL {
            return Step::Invalid {
                message: format!("Unknown tool '{tool}'. The only available tool is {SEARCH_TOOL}."),
            };
        }
        return match action.get("query").and_then(|q| q.as_str()).map(str::trim) {
            Some(query) if !query.is_empty() => Step::Search {
                thought,
                query: query.to_string(),
            },
            _ => Step::Invalid {
                message: format!("{SEARCH_TOOL} needs a non-empty \"query\" string."),
            },
        };
    }

    Step::Answer {
        thought,
        answer: text.to_string(),
    }
}

/// Extracts JSON from text that may be wrapped in markdown code fences.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(json) = trimmed
        .strip_prefix("```json")
        .and_then(|after| after.strip_suffix("```"))
    {
        return json.trim();
    }
    if let Some(json) = trimmed
        .strip_prefix("```")
        .and_then(|after| after.strip_suffix("```"))
    {
        return json.trim();
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, MockLlmClient};
    use crate::search::{MockSearchTool, SearchHit};
    use crate::stages::Capability;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    fn request(capability: Option<Capability>, max_iterations: Option<usize>) -> ReasoningRequest {
        ReasoningRequest {
            stage: "research".to_string(),
            role: "Researcher".to_string(),
            goal: "Find facts".to_string(),
            backstory: "Curious.".to_string(),
            instruction: "Find facts about tides.".to_string(),
            expected_output: "Five bullets.".to_string(),
            capability,
            max_iterations,
        }
    }

    fn reply(text: &str, tokens: u64) -> CompletionResponse {
        CompletionResponse {
            text: text.to_string(),
            usage: Some(TokenUsage {
                input_tokens: tokens,
                output_tokens: 1,
            }),
            finish_reason: Some("STOP".to_string()),
        }
    }

    #[test]
    fn parse_answer_step() {
        assert_eq!(
            parse_step(r#"{"thought": "done", "answer": "42"}"#),
            Step::Answer {
                thought: "done".to_string(),
                answer: "42".to_string()
            }
        );
    }

    #[test]
    fn parse_fenced_search_step() {
        let text = "```json\n{\"thought\": \"look\", \"action\": {\"tool\": \"web_search\", \"query\": \" tides \"}}\n```";
        assert_eq!(
            parse_step(text),
            Step::Search {
                thought: "look".to_string(),
                query: "tides".to_string()
            }
        );
    }

    #[test]
    fn parse_plain_text_is_answer() {
        assert_eq!(
            parse_step("- fact one\n- fact two"),
            Step::Answer {
                thought: String::new(),
                answer: "- fact one\n- fact two".to_string()
            }
        );
    }

    #[test]
    fn parse_unknown_tool_and_empty_query() {
        assert!(matches!(
            parse_step(r#"{"action": {"tool": "shell", "query": "ls"}}"#),
            Step::Invalid { .. }
        ));
        assert!(matches!(
            parse_step(r#"{"action": {"tool": "web_search", "query": ""}}"#),
            Step::Invalid { .. }
        ));
    }

    #[test]
    fn parse_non_string_answer_is_serialized() {
        assert_eq!(
            parse_step(r#"{"answer": ["a", "b"]}"#),
            Step::Answer {
                thought: String::new(),
                answer: r#"["a","b"]"#.to_string()
            }
        );
    }

    #[test]
    fn extract_json_variants() {
        assert_eq!(extract_json("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(extract_json("```\n{}\n```"), "{}");
        assert_eq!(extract_json("```json\n{}"), "```json\n{}");
    }

    #[tokio::test]
    async fn plain_stage_is_single_completion() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .withf(|req| {
                req.messages.len() == 1
                    && req.messages[0].content.contains("Find facts about tides.")
                    && req.system.starts_with("You are Researcher. Curious.")
                    && !req.system.contains("web_search")
            })
            .times(1)
            .returning(|_| Ok(reply("the summary", 10)));

        let executor = AgentExecutor::new(Arc::new(llm));
        let output = executor.reason(&request(None, Some(3))).await.unwrap();

        assert_eq!(output.text, "the summary");
        assert_eq!(output.usage.total(), 11);
    }

    #[tokio::test]
    async fn search_loop_feeds_observation_back() {
        let mut seq = Sequence::new();
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(reply(
                    r#"{"thought": "need data", "action": {"tool": "web_search", "query": "tides"}}"#,
                    5,
                ))
            });
        llm.expect_complete()
            .withf(|req| {
                req.messages.len() == 3
                    && req.messages[2].content.contains("https://tides.example")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply(r#"{"thought": "done", "answer": "- tides are tidal"}"#, 7)));

        let mut search = MockSearchTool::new();
        search
            .expect_search()
            .withf(|query, max| query == "tides" && *max == 2)
            .times(1)
            .returning(|_, _| {
                Ok(vec![SearchHit::new("Tides", "https://tides.example", "moon", 1)])
            });

        let executor = AgentExecutor::new(Arc::new(llm)).with_search(Arc::new(search));
        let output = executor
            .reason(&request(Some(Capability::WebSearch { max_results: 2 }), Some(3)))
            .await
            .unwrap();

        assert_eq!(output.text, "- tides are tidal");
        assert_eq!(output.usage.total(), 14);
    }

    #[tokio::test]
    async fn search_loop_hits_iteration_limit() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete().times(2).returning(|_| {
            Ok(reply(
                r#"{"action": {"tool": "web_search", "query": "again"}}"#,
                1,
            ))
        });

        let mut search = MockSearchTool::new();
        search.expect_search().times(2).returning(|_, _| Ok(vec![]));

        let executor = AgentExecutor::new(Arc::new(llm)).with_search(Arc::new(search));
        let err = executor
            .reason(&request(Some(Capability::web_search()), Some(2)))
            .await
            .unwrap_err();

        assert_eq!(err, ProviderError::IterationLimit { limit: 2 });
    }

    #[tokio::test]
    async fn last_step_gets_final_answer_nudge() {
        let mut seq = Sequence::new();
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply(r#"{"action": {"tool": "web_search", "query": "q"}}"#, 1)));
        llm.expect_complete()
            .withf(|req| req.messages[2].content.ends_with(FINAL_ANSWER_NUDGE))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply("final", 1)));

        let mut search = MockSearchTool::new();
        search.expect_search().returning(|_, _| Ok(vec![]));

        let executor = AgentExecutor::new(Arc::new(llm)).with_search(Arc::new(search));
        let output = executor
            .reason(&request(Some(Capability::web_search()), Some(2)))
            .await
            .unwrap();
        assert_eq!(output.text, "final");
    }

    #[tokio::test]
    async fn search_errors_propagate() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_| Ok(reply(r#"{"action": {"tool": "web_search", "query": "q"}}"#, 1)));

        let mut search = MockSearchTool::new();
        search.expect_search().returning(|_, _| {
            Err(ProviderError::Auth {
                message: "Unauthorized".to_string(),
            })
        });

        let executor = AgentExecutor::new(Arc::new(llm)).with_search(Arc::new(search));
        let err = executor
            .reason(&request(Some(Capability::web_search()), None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Auth { .. }));
    }

    #[tokio::test]
    async fn search_stage_without_tool_fails() {
        let llm = MockLlmClient::new();
        let executor = AgentExecutor::new(Arc::new(llm));
        let err = executor
            .reason(&request(Some(Capability::web_search()), Some(3)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no search tool"));
    }
}
