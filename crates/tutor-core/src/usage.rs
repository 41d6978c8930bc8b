//! Token and tool-call accounting for one agent run

use serde::{Deserialize, Serialize};

use crate::providers::ChatUsage;

/// Accumulated usage from a single run (may span multiple model calls)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatedUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub api_calls: u32,
    pub tool_calls: Vec<String>,
}

impl AccumulatedUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add usage from a single model response
    pub fn add(&mut self, usage: ChatUsage) {
        self.input_tokens += u64::from(usage.input_tokens);
        self.output_tokens += u64::from(usage.output_tokens);
        self.api_calls += 1;
    }

    /// Record a tool call
    pub fn record_tool_call(&mut self, tool_name: &str) {
        self.tool_calls.push(tool_name.to_string());
    }

    /// Fold another run's usage into this one
    pub fn merge(&mut self, other: &AccumulatedUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.api_calls += other.api_calls;
        self.tool_calls.extend(other.tool_calls.iter().cloned());
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
