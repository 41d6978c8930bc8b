//! tutor-core - Agents, tools, and runtime behind the tutoring assistant
//!
//! This crate provides:
//! - Topic classifier with canned advice for math, writing, and study topics
//! - Per-conversation student context with the study notebook
//! - Tool registry with the tutoring tools
//! - Agent roster (triage plus three specialists) with handoffs by id
//! - Runner driving the model tool-use loop over pluggable LLM providers

pub mod agents;
pub mod classifier;
pub mod context;
pub mod error;
pub mod prompt;
pub mod providers;
pub mod runner;
pub mod tools;
pub mod usage;

// Re-export main types for convenience
pub use agents::{AgentId, AgentProfile, AgentRoster};
pub use classifier::{TopicCategory, classify};
pub use context::StudentContext;
pub use error::{ProviderError, RosterError, RunnerError};
pub use providers::{ChatMessage, LlmProvider, ModelRouter};
pub use runner::{RunContext, RunItem, RunResult, Runner};
pub use tools::tutoring::tutoring_registry;
pub use tools::{ToolHandler, ToolRegistry};
pub use usage::AccumulatedUsage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Just verify that all main types are exported
        let _ = std::mem::size_of::<AgentRoster>();
        let _ = std::mem::size_of::<StudentContext>();
        let _ = std::mem::size_of::<ToolRegistry<StudentContext>>();
        let _ = std::mem::size_of::<Runner<StudentContext>>();
        let _ = std::mem::size_of::<RunResult>();
    }
}
