//! Agent profile: an agent's identity, instructions, tools, and handoff targets

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an agent owned by an [`AgentRoster`](super::AgentRoster)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub(crate) usize);

impl AgentId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// An agent profile is static configuration: the runtime decides when to
/// switch agents, the profile only says which switches are legal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub name: String,
    /// Shown to other agents when this agent is offered as a handoff target
    pub handoff_description: String,
    pub instructions: String,
    /// Names of the tools this agent may call
    #[serde(default)]
    pub tools: Vec<String>,
    /// Agents this agent may hand the conversation to
    #[serde(default)]
    pub handoffs: Vec<AgentId>,
}

impl AgentProfile {
    pub(crate) fn new(
        id: AgentId,
        name: impl Into<String>,
        handoff_description: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            handoff_description: handoff_description.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
            handoffs: Vec::new(),
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Check if a tool is allowed for this agent
    pub fn is_tool_allowed(&self, tool_name: &str) -> bool {
        self.tools.iter().any(|t| t == tool_name)
    }

    /// Name of the tool the model calls to transfer to this agent
    pub fn handoff_tool_name(&self) -> String {
        format!("transfer_to_{}", snake_case(&self.name))
    }

    /// Description of the handoff tool offered to other agents
    pub fn handoff_tool_description(&self) -> String {
        let mut description = format!("Handoff to the {} agent to handle the request.", self.name);
        if !self.handoff_description.is_empty() {
            description.push(' ');
            description.push_str(&self.handoff_description);
        }
        description
    }
}

/// "Math Tutor" → "math_tutor"
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}
