//! System prompt building for agents taking part in handoffs

use tracing::debug;

/// Shared preamble for every agent that can hand a conversation to another
pub const HANDOFF_PROMPT_PREFIX: &str = "# System context\n\
You are part of a multi-agent system designed to make agent coordination and execution easy. \
It uses two primary abstractions: **Agents** and **Handoffs**. An agent encompasses \
instructions and tools and can hand off a conversation to another agent when appropriate. \
Handoffs are achieved by calling a handoff function, generally named `transfer_to_<agent_name>`. \
Transfers between agents are handled seamlessly in the background; do not mention or draw \
attention to these transfers in your conversation with the user.\n";

/// Prefix agent instructions with the handoff preamble
pub fn with_handoff_prefix(instructions: &str) -> String {
    format!("{}\n{}", HANDOFF_PROMPT_PREFIX, instructions.trim())
}

/// Build the system prompt for one model call
pub fn build_system_prompt(instructions: &str, extra_context: Option<&str>) -> String {
    let mut prompt = String::new();
    prompt.push_str(instructions);
    prompt.push_str("\n\n");

    if let Some(extra) = extra_context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str("# STUDENT\n\n");
        prompt.push_str(extra.trim_end());
        prompt.push_str("\n\n");
    }

    debug!("Built system prompt ({} chars)", prompt.len());

    prompt
}
