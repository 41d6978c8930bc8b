//! Tool registry and handler trait
//!
//! Tools are generic over the run context `C` so that handlers which need
//! conversation state (e.g. the study notebook) receive it as `&mut C`, while
//! stateless handlers simply ignore it.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::providers::ToolDefinition;

pub mod tutoring;

/// Individual tool handler
#[async_trait]
pub trait ToolHandler<C: Send>: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: Value, context: &mut C) -> Result<String>;
}

/// Registry of available tools
pub struct ToolRegistry<C: Send> {
    tools: HashMap<String, Arc<dyn ToolHandler<C>>>,
}

impl<C: Send> ToolRegistry<C> {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool handler
    pub fn register(&mut self, handler: Arc<dyn ToolHandler<C>>) {
        let name = handler.name().to_string();
        debug!("Registering tool: {}", name);
        if self.tools.insert(name.clone(), handler).is_some() {
            warn!("Tool {} registered twice; keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler<C>>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions for the named tools, in the order given
    pub fn filter_tools(&self, names: &[String]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|handler| definition_of(handler.as_ref()))
            .collect()
    }

    /// Run a tool by name
    pub async fn execute(&self, tool_name: &str, input: Value, context: &mut C) -> Result<String> {
        debug!("Executing tool: {} with input: {}", tool_name, input);

        let handler = self
            .tools
            .get(tool_name)
            .ok_or_else(|| anyhow!("Unknown tool: {}", tool_name))?;

        match handler.execute(input, context).await {
            Ok(result) => {
                debug!("Tool {} succeeded", tool_name);
                Ok(result)
            }
            Err(e) => {
                warn!("Tool {} failed: {}", tool_name, e);
                Err(e)
            }
        }
    }
}

impl<C: Send> Default for ToolRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn definition_of<C: Send>(handler: &dyn ToolHandler<C>) -> ToolDefinition {
    ToolDefinition {
        name: handler.name().to_string(),
        description: handler.description().to_string(),
        input_schema: handler.input_schema(),
    }
}

/// Helper function to create a JSON schema for tool input
pub fn json_schema(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Extract a required string argument from tool input
pub fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Missing '{}' parameter", key))
}
