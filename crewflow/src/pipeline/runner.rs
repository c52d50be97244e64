//! Sequential pipeline execution.

use super::builder::{Pipeline, TOPIC_KEY};
use super::context::{RunContext, RunReport};
use super::retry::{should_retry, RetryConfig, RetryDecision, RetryState};
use crate::errors::{CrewError, ProviderError, StageFailure};
use crate::events::{EventSink, NoOpEventSink};
use crate::reasoning::{ReasoningOutput, ReasoningRequest, ReasoningService};
use crate::stages::{Stage, StageResult};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn, Instrument};

/// Runs a pipeline's stages strictly in order against a reasoning service.
///
/// Stage `n + 1` never starts before stage `n`'s result is recorded, and a
/// failing stage ends the run: later stages are never invoked.
pub struct PipelineRunner {
    service: Arc<dyn ReasoningService>,
    retry: RetryConfig,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl PipelineRunner {
    /// Creates a runner with the default retry schedule and no event sink.
    #[must_use]
    pub fn new(service: Arc<dyn ReasoningService>) -> Self {
        Self {
            service,
            retry: RetryConfig::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the delay schedule between retries.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Runs the pipeline for `topic`. A blank topic falls back to the
    /// pipeline's default topic.
    ///
    /// # Errors
    ///
    /// Returns [`CrewError::Validation`] if a template cannot be rendered, and
    /// [`CrewError::Stage`] naming the first stage that failed.
    pub async fn run(&self, pipeline: &Pipeline, topic: &str) -> Result<RunReport, CrewError> {
        self.run_with_inputs(pipeline, topic, HashMap::new()).await
    }

    /// Like [`PipelineRunner::run`], with extra template inputs.
    ///
    /// The resolved topic always wins over a `topic` entry in `inputs`.
    ///
    /// # Errors
    ///
    /// See [`PipelineRunner::run`].
    pub async fn run_with_inputs(
        &self,
        pipeline: &Pipeline,
        topic: &str,
        mut inputs: HashMap<String, String>,
    ) -> Result<RunReport, CrewError> {
        let topic = pipeline.resolve_topic(topic);
        inputs.insert(TOPIC_KEY.to_string(), topic.clone());

        // Every stage is rendered before the first external call.
        let stages = pipeline.render(&inputs)?;

        let ctx = RunContext::new(topic, inputs);
        let span = info_span!("pipeline_run", pipeline = %pipeline.name(), run_id = %ctx.run_id());
        self.execute(&stages, ctx).instrument(span).await
    }

    async fn execute(&self, stages: &[Stage], mut ctx: RunContext) -> Result<RunReport, CrewError> {
        let started = Instant::now();
        let run_id = ctx.run_id().to_string();
        let stage_names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();

        info!(topic = %ctx.topic(), stages = ?stage_names, "Starting pipeline");
        self.events
            .emit(
                "pipeline.started",
                Some(json!({
                    "run_id": run_id,
                    "topic": ctx.topic(),
                    "inputs": ctx.inputs(),
                    "stages": stage_names,
                })),
            )
            .await;

        for (index, stage) in stages.iter().enumerate() {
            let request = ReasoningRequest::for_stage(stage, ctx.results());
            let started_at = Utc::now();

            info!(stage = %stage.name, index, search = stage.needs_search(), "Starting stage");
            self.events
                .emit("stage.started", Some(json!({"stage": stage.name, "index": index})))
                .await;

            let (outcome, retries) = self.run_stage(stage, &request).await;

            match outcome {
                Ok(ReasoningOutput { text, usage }) => {
                    let result = StageResult::completed(&stage.name, text, retries, started_at);
                    info!(
                        stage = %stage.name,
                        retries,
                        duration_ms = result.duration_ms(),
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "Stage completed"
                    );
                    self.events
                        .emit(
                            "stage.completed",
                            Some(json!({
                                "stage": stage.name,
                                "retries": retries,
                                "duration_ms": result.duration_ms(),
                            })),
                        )
                        .await;
                    ctx.record(result, usage);
                }
                Err(source) => {
                    let result = StageResult::failed(&stage.name, source.to_string(), retries, started_at);
                    error!(
                        stage = %stage.name,
                        retries,
                        kind = source.kind(),
                        duration_ms = result.duration_ms(),
                        error = %source,
                        "Stage failed"
                    );
                    self.events
                        .emit(
                            "stage.failed",
                            Some(json!({
                                "stage": result.stage,
                                "retries": result.retries,
                                "duration_ms": result.duration_ms(),
                                "kind": source.kind(),
                                "error": result.error,
                            })),
                        )
                        .await;
                    self.events
                        .emit(
                            "pipeline.failed",
                            Some(json!({
                                "run_id": run_id,
                                "stage": result.stage,
                                "error": result.error,
                            })),
                        )
                        .await;

                    return Err(StageFailure::new(&stage.name, index, retries, source).into());
                }
            }
        }

        let duration = started.elapsed();
        let usage = ctx.usage();
        info!(
            duration_ms = millis(duration),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Pipeline completed"
        );
        self.events
            .emit(
                "pipeline.completed",
                Some(json!({"run_id": run_id, "duration_ms": millis(duration)})),
            )
            .await;

        Ok(ctx.into_report(duration))
    }

    /// Runs one stage with retries, all inside its time budget.
    ///
    /// Returns the outcome and the number of retries performed.
    async fn run_stage(
        &self,
        stage: &Stage,
        request: &ReasoningRequest,
    ) -> (Result<ReasoningOutput, ProviderError>, usize) {
        let mut retries = 0usize;

        let attempts = async {
            let mut state = RetryState::new();
            loop {
                let error = match self.service.reason(request).await {
                    Ok(output) => return Ok(output),
                    Err(error) => error,
                };

                match should_retry(&mut state, &self.retry, stage.budget.max_retries, error.is_retryable()) {
                    RetryDecision::Retry(delay) => {
                        retries = state.attempt;
                        warn!(
                            stage = %stage.name,
                            attempt = state.attempt,
                            delay_ms = millis(delay),
                            error = %error,
                            "Retrying stage"
                        );
                        self.events
                            .emit(
                                "stage.retrying",
                                Some(json!({
                                    "stage": stage.name,
                                    "attempt": state.attempt,
                                    "delay_ms": millis(delay),
                                    "kind": error.kind(),
                                })),
                            )
                            .await;
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::GiveUp | RetryDecision::NotRetryable => return Err(error),
                }
            }
        };

        let outcome = match stage.budget.time_budget {
            Some(budget) => tokio::time::timeout(budget, attempts)
                .await
                .unwrap_or(Err(ProviderError::TimeBudgetExceeded { budget })),
            None => attempts.await,
        };

        (outcome, retries)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(feature = "http")]
impl PipelineRunner {
    /// Wires the production stack: Gemini for reasoning, Serper for search.
    ///
    /// Search is attached only when a search key is present.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn from_config(
        config: &crate::config::CrewConfig,
        credentials: &crate::credentials::Credentials,
    ) -> Result<Self, CrewError> {
        use crate::errors::ConfigError;
        use crate::llm::GeminiClient;
        use crate::reasoning::AgentExecutor;
        use crate::search::SerperSearch;

        let to_config = |e: ProviderError| CrewError::from(ConfigError::invalid("http_client", e.to_string()));

        let llm = GeminiClient::new(&config.llm, credentials.llm_api_key.clone()).map_err(to_config)?;
        let mut executor = AgentExecutor::new(Arc::new(llm));

        if let Some(key) = credentials.search_api_key.clone().filter(|_| config.search.enabled) {
            let timeout = config.llm.request_timeout();
            let search = SerperSearch::new(key, timeout).map_err(to_config)?;
            executor = executor.with_search(Arc::new(search));
        }

        Ok(Self::new(Arc::new(executor)).with_retry(config.retry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::pipeline::PipelineBuilder;
    use crate::reasoning::MockReasoningService;
    use crate::stages::{StageBudget, StageTemplate};
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    fn pipeline(budget: StageBudget) -> Pipeline {
        PipelineBuilder::new("test")
            .stage(StageTemplate::new("research", "Find facts about {topic}.").with_budget(budget))
            .unwrap()
            .stage(StageTemplate::new("write", "Summarize {topic}.").with_budget(budget))
            .unwrap()
            .build()
            .unwrap()
    }

    fn runner(service: MockReasoningService) -> PipelineRunner {
        PipelineRunner::new(Arc::new(service)).with_retry(RetryConfig::immediate())
    }

    #[tokio::test]
    async fn test_runs_in_order_with_context() {
        let mut seq = Sequence::new();
        let mut service = MockReasoningService::new();
        service
            .expect_reason()
            .withf(|r| r.stage == "research" && r.instruction == "Find facts about tides.")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ReasoningOutput::text("5 facts")));
        service
            .expect_reason()
            .withf(|r| r.stage == "write" && r.instruction.ends_with("[research]\n5 facts\n"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ReasoningOutput::text("summary")));

        let report = runner(service)
            .run(&pipeline(StageBudget::default()), "tides")
            .await
            .unwrap();

        assert_eq!(report.topic, "tides");
        assert_eq!(report.final_output, "summary");
        assert_eq!(report.results.len(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let mut seq = Sequence::new();
        let mut service = MockReasoningService::new();
        service
            .expect_reason()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(ProviderError::RateLimited { message: "slow".into() }));
        service
            .expect_reason()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ReasoningOutput::text("ok")));

        let events = Arc::new(CollectingEventSink::new());
        let report = runner(service)
            .with_event_sink(events.clone())
            .run(&pipeline(StageBudget::default().with_max_retries(2)), "x")
            .await
            .unwrap();

        assert_eq!(report.results[0].retries, 2);
        assert_eq!(report.results[1].retries, 0);
        assert_eq!(events.stages_for("stage.retrying"), vec!["research", "research"]);
    }

    #[tokio::test]
    async fn test_retries_exhausted_fails_stage() {
        let mut service = MockReasoningService::new();
        service
            .expect_reason()
            .times(2)
            .returning(|_| Err(ProviderError::Server { status: 503, message: "busy".into() }));

        let err = runner(service)
            .run(&pipeline(StageBudget::default().with_max_retries(1)), "x")
            .await
            .unwrap_err();

        let CrewError::Stage(failure) = err else {
            panic!("expected stage failure");
        };
        assert_eq!(failure.stage, "research");
        assert_eq!(failure.index, 0);
        assert_eq!(failure.retries, 1);
    }

    #[tokio::test]
    async fn test_quota_is_not_retried() {
        let mut service = MockReasoningService::new();
        service
            .expect_reason()
            .times(1)
            .returning(|_| Err(ProviderError::QuotaExceeded { message: "quota".into() }));

        let events = Arc::new(CollectingEventSink::new());
        let err = runner(service)
            .with_event_sink(events.clone())
            .run(&pipeline(StageBudget::default().with_max_retries(5)), "x")
            .await
            .unwrap_err();

        assert!(err.is_quota_exceeded());
        assert_eq!(err.failing_stage(), Some("research"));
        assert_eq!(
            events.event_types(),
            vec!["pipeline.started", "stage.started", "stage.failed", "pipeline.failed"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_budget_exceeded() {
        struct Slow;

        #[async_trait::async_trait]
        impl ReasoningService for Slow {
            async fn reason(&self, _: &ReasoningRequest) -> Result<ReasoningOutput, ProviderError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ReasoningOutput::text("late"))
            }
        }

        let budget = StageBudget::default().with_time_budget(Some(Duration::from_secs(1)));
        let err = PipelineRunner::new(Arc::new(Slow))
            .run(&pipeline(budget), "x")
            .await
            .unwrap_err();

        let CrewError::Stage(failure) = err else {
            panic!("expected stage failure");
        };
        assert_eq!(
            failure.source,
            ProviderError::TimeBudgetExceeded {
                budget: Duration::from_secs(1)
            }
        );
    }

    #[tokio::test]
    async fn test_render_error_makes_no_calls() {
        let mut service = MockReasoningService::new();
        service.expect_reason().never();

        let pipeline = PipelineBuilder::new("test")
            .stage(StageTemplate::new("a", "About {topic}."))
            .unwrap()
            .stage(StageTemplate::new("b", "About {audience}."))
            .unwrap()
            .build()
            .unwrap();

        let err = runner(service).run(&pipeline, "x").await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_extra_inputs_and_topic_precedence() {
        let mut service = MockReasoningService::new();
        service
            .expect_reason()
            .withf(|r| r.instruction == "About tides for kids.")
            .times(1)
            .returning(|_| Ok(ReasoningOutput::text("done")));

        let pipeline = PipelineBuilder::new("test")
            .stage(StageTemplate::new("a", "About {topic} for {audience}."))
            .unwrap()
            .build()
            .unwrap();

        let inputs = HashMap::from([
            ("audience".to_string(), "kids".to_string()),
            ("topic".to_string(), "ignored".to_string()),
        ]);
        let events = Arc::new(CollectingEventSink::new());
        let report = runner(service)
            .with_event_sink(events.clone())
            .run_with_inputs(&pipeline, "tides", inputs)
            .await
            .unwrap();
        assert_eq!(report.final_output, "done");

        // The started event records the inputs the stages were rendered with.
        let (event_type, payload) = events.events().remove(0);
        assert_eq!(event_type, "pipeline.started");
        let payload = payload.unwrap();
        assert_eq!(payload["inputs"], json!({"audience": "kids", "topic": "tides"}));
        assert_eq!(payload["topic"], "tides");
    }
}
