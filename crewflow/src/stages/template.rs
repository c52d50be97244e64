//! Prompt templating.
//!
//! Templates use `{name}` placeholders filled from the run inputs. `{{` and
//! `}}` produce literal braces. Rendering is a pure function: the same
//! template and inputs always give the same [`Stage`].

use super::{Capability, Stage, StageBudget};
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

static PLACEHOLDER_PATTERN: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::expect_used)]
fn placeholder_pattern() -> &'static Regex {
    PLACEHOLDER_PATTERN.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Substitutes `{key}` placeholders in `template` from `inputs`.
///
/// # Errors
///
/// Returns an error naming the first placeholder with no matching input.
pub fn render_template(
    template: &str,
    inputs: &HashMap<String, String>,
) -> Result<String, PipelineValidationError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in placeholder_pattern().captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(substitution(&caps, inputs)?);
        last = whole.end();
    }
    rendered.push_str(&template[last..]);

    Ok(rendered)
}

fn substitution<'a>(
    caps: &Captures<'a>,
    inputs: &'a HashMap<String, String>,
) -> Result<&'a str, PipelineValidationError> {
    let Some(key) = caps.get(1) else {
        // Escaped brace pair.
        return Ok(if caps.get(0).is_some_and(|m| m.as_str() == "{{") {
            "{"
        } else {
            "}"
        });
    };

    inputs.get(key.as_str()).map(String::as_str).ok_or_else(|| {
        PipelineValidationError::new(format!(
            "Template variable '{}' has no matching input",
            key.as_str()
        ))
        .with_error_info(
            ContractErrorInfo::new(
                "TEMPLATE-MISSING-INPUT",
                format!("No input provided for '{{{}}}'", key.as_str()),
            )
            .with_context_entry("variable", key.as_str())
            .with_fix_hint("Pass the variable in the run inputs or escape the braces as '{{' and '}}'."),
        )
    })
}

/// Returns the distinct placeholder names used in `template`, sorted.
#[must_use]
pub fn placeholders(template: &str) -> BTreeSet<String> {
    placeholder_pattern()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// A stage as configured, before the run inputs are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTemplate {
    /// Unique stage name within the pipeline.
    pub name: String,
    /// Persona template.
    #[serde(default)]
    pub role: String,
    /// Goal template.
    #[serde(default)]
    pub goal: String,
    /// Backstory template.
    #[serde(default)]
    pub backstory: String,
    /// Instruction template.
    pub instruction: String,
    /// Expected-output template.
    #[serde(default)]
    pub expected_output: String,
    /// Optional external capability.
    #[serde(default)]
    pub capability: Option<Capability>,
    /// Iteration and time bounds.
    #[serde(default)]
    pub budget: StageBudget,
}

impl StageTemplate {
    /// Creates a new stage template with default budget and no persona.
    #[must_use]
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: String::new(),
            goal: String::new(),
            backstory: String::new(),
            instruction: instruction.into(),
            expected_output: String::new(),
            capability: None,
            budget: StageBudget::default(),
        }
    }

    /// Sets the persona.
    #[must_use]
    pub fn with_agent(
        mut self,
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        self.role = role.into();
        self.goal = goal.into();
        self.backstory = backstory.into();
        self
    }

    /// Sets the expected-output descriptor.
    #[must_use]
    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = expected.into();
        self
    }

    /// Sets the capability requirement.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Removes any capability requirement.
    #[must_use]
    pub fn without_capability(mut self) -> Self {
        self.capability = None;
        self
    }

    /// Sets the budget.
    #[must_use]
    pub fn with_budget(mut self, budget: StageBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Every placeholder referenced by any of this template's fields.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<String> {
        [
            &self.role,
            &self.goal,
            &self.backstory,
            &self.instruction,
            &self.expected_output,
        ]
        .into_iter()
        .flat_map(|field| placeholders(field))
        .collect()
    }

    /// Renders the template with the given inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder has no matching input.
    pub fn render(&self, inputs: &HashMap<String, String>) -> Result<Stage, PipelineValidationError> {
        let stage_error = |e: PipelineValidationError| e.with_stages(vec![self.name.clone()]);

        Ok(Stage {
            name: self.name.clone(),
            role: render_template(&self.role, inputs).map_err(stage_error)?,
            goal: render_template(&self.goal, inputs).map_err(stage_error)?,
            backstory: render_template(&self.backstory, inputs).map_err(stage_error)?,
            instruction: render_template(&self.instruction, inputs).map_err(stage_error)?,
            expected_output: render_template(&self.expected_output, inputs).map_err(stage_error)?,
            capability: self.capability,
            budget: self.budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_every_occurrence() {
        let rendered = render_template(
            "Facts about {topic}. More on {topic}!",
            &inputs(&[("topic", "quantum computing")]),
        )
        .unwrap();
        assert_eq!(rendered, "Facts about quantum computing. More on quantum computing!");
    }

    #[test]
    fn test_render_missing_input_is_an_error() {
        let err = render_template("About {subject}", &inputs(&[("topic", "x")])).unwrap_err();
        assert!(err.message.contains("subject"));
        assert_eq!(err.code(), Some("TEMPLATE-MISSING-INPUT"));
    }

    #[test]
    fn test_render_escaped_braces() {
        let rendered = render_template(
            r#"Reply as {{"answer": "..."}} about {topic}"#,
            &inputs(&[("topic", "rust")]),
        )
        .unwrap();
        assert_eq!(rendered, r#"Reply as {"answer": "..."} about rust"#);
    }

    #[test]
    fn test_render_leaves_non_identifier_braces() {
        let rendered = render_template("set {1, 2} of {topic}", &inputs(&[("topic", "t")])).unwrap();
        assert_eq!(rendered, "set {1, 2} of t");
    }

    #[test]
    fn test_render_substituted_value_not_reinterpreted() {
        let rendered = render_template("{topic}", &inputs(&[("topic", "{other}")])).unwrap();
        assert_eq!(rendered, "{other}");
    }

    #[test]
    fn test_placeholders() {
        let names = placeholders("{topic} and {audience} and {topic} but not {{escaped}}");
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["audience", "topic"]);
    }

    #[test]
    fn test_stage_template_render() {
        let template = StageTemplate::new("research", "Find facts about {topic}.")
            .with_agent("Researcher", "Know everything about {topic}", "Curious.")
            .with_expected_output("Bullets on {topic}")
            .with_capability(Capability::web_search());

        let stage = template.render(&inputs(&[("topic", "bees")])).unwrap();

        assert_eq!(stage.name, "research");
        assert_eq!(stage.instruction, "Find facts about bees.");
        assert_eq!(stage.goal, "Know everything about bees");
        assert_eq!(stage.expected_output, "Bullets on bees");
        assert!(stage.needs_search());
        assert_eq!(
            template.variables().into_iter().collect::<Vec<_>>(),
            vec!["topic"]
        );
    }

    #[test]
    fn test_stage_template_render_error_names_stage() {
        let template = StageTemplate::new("write", "Summarize {topic} for {audience}");
        let err = template.render(&inputs(&[("topic", "bees")])).unwrap_err();
        assert_eq!(err.stages, vec!["write".to_string()]);
    }
}
