//! Tutoring tools: canned advice per subject and the shared study notebook

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{ToolHandler, ToolRegistry, json_schema, required_str};
use crate::classifier::{TopicCategory, classify};
use crate::context::StudentContext;

pub const MATH_EXPLANATION_TOOL: &str = "math_explanation_tool";
pub const WRITING_FEEDBACK_TOOL: &str = "writing_feedback_tool";
pub const STUDY_STRATEGY_TOOL: &str = "study_strategy_tool";
pub const ADD_STUDY_NOTE_TOOL: &str = "add_study_note";

/// Read-only advice tool backed by the topic classifier
pub struct AdviceTool {
    category: TopicCategory,
}

impl AdviceTool {
    pub fn math() -> Self {
        Self {
            category: TopicCategory::Math,
        }
    }

    pub fn writing() -> Self {
        Self {
            category: TopicCategory::Writing,
        }
    }

    pub fn study() -> Self {
        Self {
            category: TopicCategory::Study,
        }
    }

    pub fn category(&self) -> TopicCategory {
        self.category
    }

    /// Name of the single string argument this tool takes
    fn argument(&self) -> &'static str {
        match self.category {
            TopicCategory::Math => "topic",
            TopicCategory::Writing => "writing_type",
            TopicCategory::Study => "study_topic",
        }
    }
}

#[async_trait]
impl<C: Send> ToolHandler<C> for AdviceTool {
    fn name(&self) -> &str {
        match self.category {
            TopicCategory::Math => MATH_EXPLANATION_TOOL,
            TopicCategory::Writing => WRITING_FEEDBACK_TOOL,
            TopicCategory::Study => STUDY_STRATEGY_TOOL,
        }
    }

    fn description(&self) -> &str {
        match self.category {
            TopicCategory::Math => "Provide step-by-step math explanations.",
            TopicCategory::Writing => "Provide writing feedback and tips.",
            TopicCategory::Study => "Provide study strategies and techniques.",
        }
    }

    fn input_schema(&self) -> Value {
        let description = match self.category {
            TopicCategory::Math => "The math topic or problem to explain",
            TopicCategory::Writing => "The kind of writing or writing concern",
            TopicCategory::Study => "The study challenge or technique of interest",
        };
        let mut properties = serde_json::Map::new();
        properties.insert(
            self.argument().to_string(),
            serde_json::json!({
                "type": "string",
                "description": description
            }),
        );
        json_schema(Value::Object(properties), vec![self.argument()])
    }

    async fn execute(&self, input: Value, _context: &mut C) -> Result<String> {
        let topic = required_str(&input, self.argument())?;
        debug!("Classifying {} topic: {}", self.category, topic);
        Ok(classify(self.category, topic).to_string())
    }
}

/// Append a note to the student's study session
pub struct AddStudyNoteTool;

#[async_trait]
impl ToolHandler<StudentContext> for AddStudyNoteTool {
    fn name(&self) -> &str {
        ADD_STUDY_NOTE_TOOL
    }

    fn description(&self) -> &str {
        "Add a note to the student's study session."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "note": {
                    "type": "string",
                    "description": "The note to add to the study session."
                }
            }),
            vec!["note"],
        )
    }

    async fn execute(&self, input: Value, context: &mut StudentContext) -> Result<String> {
        let note = required_str(&input, "note")?;
        Ok(context.add_note(note))
    }
}

/// Registry holding every tutoring tool
pub fn tutoring_registry() -> ToolRegistry<StudentContext> {
    let mut registry: ToolRegistry<StudentContext> = ToolRegistry::new();
    registry.register(Arc::new(AdviceTool::math()));
    registry.register(Arc::new(AdviceTool::writing()));
    registry.register(Arc::new(AdviceTool::study()));
    registry.register(Arc::new(AddStudyNoteTool));
    registry
}
