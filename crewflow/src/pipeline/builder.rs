//! Pipeline builder with validation.

use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::stages::{Stage, StageTemplate, DEFAULT_TOPIC};
use std::collections::{HashMap, HashSet};

/// Input key every stage template can reference.
pub const TOPIC_KEY: &str = "topic";

/// Builder for creating validated pipelines.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// Stage templates in declared order.
    stages: Vec<StageTemplate>,
    /// Names seen so far.
    names: HashSet<String>,
    /// Topic substituted when the caller's topic is blank.
    default_topic: String,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            names: HashSet::new(),
            default_topic: DEFAULT_TOPIC.to_string(),
        }
    }

    /// Appends a stage. Stages run in the order they are added.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage name is blank or already taken.
    pub fn stage(mut self, template: StageTemplate) -> Result<Self, PipelineValidationError> {
        self.add_stage(template)?;
        Ok(self)
    }

    /// Appends several stages.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn stages(mut self, templates: impl IntoIterator<Item = StageTemplate>) -> Result<Self, PipelineValidationError> {
        for template in templates {
            self.add_stage(template)?;
        }
        Ok(self)
    }

    /// Sets the topic used when the caller's topic is blank.
    #[must_use]
    pub fn default_topic(mut self, topic: impl Into<String>) -> Self {
        self.default_topic = topic.into();
        self
    }

    fn add_stage(&mut self, template: StageTemplate) -> Result<(), PipelineValidationError> {
        if template.name.trim().is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Stage #{} has a blank name",
                self.stages.len() + 1
            ))
            .with_error_info(
                ContractErrorInfo::new("PIPELINE-BLANK-NAME", "Stage names cannot be blank")
                    .with_fix_hint("Give every stage a short, unique name such as 'research'."),
            ));
        }

        if !self.names.insert(template.name.clone()) {
            return Err(PipelineValidationError::new(format!(
                "Duplicate stage name '{}'",
                template.name
            ))
            .with_stages(vec![template.name.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "PIPELINE-DUPLICATE",
                    format!("Stage '{}' is declared twice", template.name),
                )
                .with_fix_hint("Rename one of the stages; results are looked up by name."),
            ));
        }

        self.stages.push(template);
        Ok(())
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages or the default topic is blank.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_error_info(
                    ContractErrorInfo::new("PIPELINE-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one stage to the pipeline before building."),
                ));
        }

        let default_topic = self.default_topic.trim().to_string();
        if default_topic.is_empty() {
            return Err(PipelineValidationError::new("Default topic is blank")
                .with_error_info(ContractErrorInfo::new(
                    "PIPELINE-BLANK-TOPIC",
                    "The fallback topic must be non-empty",
                )));
        }

        Ok(Pipeline {
            name: self.name,
            stages: self.stages,
            default_topic,
        })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// A validated, non-empty, ordered list of stage templates.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<StageTemplate>,
    default_topic: String,
}

impl Pipeline {
    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage templates in run order.
    #[must_use]
    pub fn stages(&self) -> &[StageTemplate] {
        &self.stages
    }

    /// Returns the stage names in run order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }

    /// Returns the fallback topic.
    #[must_use]
    pub fn default_topic(&self) -> &str {
        &self.default_topic
    }

    /// Trims `topic`, falling back to the default when blank.
    #[must_use]
    pub fn resolve_topic(&self, topic: &str) -> String {
        resolve_topic(topic, &self.default_topic)
    }

    /// Renders every stage for one run.
    ///
    /// # Errors
    ///
    /// Returns the first template that references an input that was not supplied.
    pub fn render(&self, inputs: &HashMap<String, String>) -> Result<Vec<Stage>, PipelineValidationError> {
        self.stages.iter().map(|t| t.render(inputs)).collect()
    }
}

/// Trims `topic`, falling back to `default` when blank.
#[must_use]
pub fn resolve_topic(topic: &str, default: &str) -> String {
    let topic = topic.trim();
    if topic.is_empty() {
        default.trim().to_string()
    } else {
        topic.to_string()
    }
}
