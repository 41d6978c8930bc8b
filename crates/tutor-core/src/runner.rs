//! Agent runtime: the model tool-use loop with handoffs between agents
//!
//! One call to [`Runner::run`] is one conversational turn. The runner keeps
//! calling the model for the current agent, dispatching tool calls and
//! switching agents on handoff, until the model answers without tool calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::agents::{AgentId, AgentProfile, AgentRoster};
use crate::error::{Result, RunnerError};
use crate::prompt::build_system_prompt;
use crate::providers::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponseBlock, ChatRole, LlmProvider,
    StopReason, ToolDefinition,
};
use crate::tools::{ToolRegistry, json_schema};
use crate::usage::AccumulatedUsage;

pub const DEFAULT_MAX_TURNS: usize = 10;
pub const MAX_TOOL_OUTPUT: usize = 100_000;

const MULTIPLE_HANDOFFS: &str = "Multiple handoffs detected, ignoring this one.";

/// Per-conversation state handed to tools as `&mut`
pub trait RunContext: Send {
    /// Extra text appended to every agent's system prompt
    fn prompt_context(&self) -> Option<String> {
        None
    }
}

impl RunContext for () {}

/// Something that happened during a run, in the order it happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunItem {
    Message {
        agent: AgentId,
        text: String,
    },
    HandoffCall {
        agent: AgentId,
        tool_call_id: String,
    },
    Handoff {
        source: AgentId,
        target: AgentId,
    },
    ToolCall {
        agent: AgentId,
        name: String,
        input: Value,
    },
    ToolOutput {
        agent: AgentId,
        name: String,
        output: String,
    },
}

/// Outcome of one run
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Full history to feed into the next run
    pub history: Vec<ChatMessage>,
    /// Agent that produced the final response
    pub last_agent: AgentId,
    pub new_items: Vec<RunItem>,
    pub usage: AccumulatedUsage,
}

impl RunResult {
    /// Text of the final agent message, if any
    pub fn final_output(&self) -> Option<&str> {
        self.new_items.iter().rev().find_map(|item| match item {
            RunItem::Message { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Drives agents over a model provider and a tool registry
pub struct Runner<C: RunContext> {
    provider: Arc<dyn LlmProvider>,
    tools: ToolRegistry<C>,
    max_turns: usize,
}

impl<C: RunContext> Runner<C> {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: ToolRegistry<C>) -> Self {
        Self {
            provider,
            tools,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    /// Limit on model calls per run
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn tools(&self) -> &ToolRegistry<C> {
        &self.tools
    }

    /// Run one turn starting from `agent`
    #[instrument(skip_all, fields(agent = %roster.name_of(agent), history_len = history.len()))]
    pub async fn run(
        &self,
        roster: &AgentRoster,
        agent: AgentId,
        mut history: Vec<ChatMessage>,
        context: &mut C,
    ) -> Result<RunResult> {
        let mut current = agent;
        let mut items = Vec::new();
        let mut usage = AccumulatedUsage::new();
        let mut turns = 0;

        loop {
            turns += 1;
            if turns > self.max_turns {
                warn!("Run exceeded maximum turns ({})", self.max_turns);
                return Err(RunnerError::MaxTurnsExceeded(self.max_turns));
            }

            let profile = roster.get(current)?;
            let system = build_system_prompt(&profile.instructions, context.prompt_context().as_deref());
            let tools = self.tool_definitions(roster, profile)?;

            info!("Turn {} with agent '{}' ({} tools)", turns, profile.name, tools.len());

            let response = self
                .provider
                .chat(&history, &tools, &system)
                .await
                .map_err(RunnerError::Provider)?;
            usage.add(response.usage);
            history.push(response.to_message());

            if response.stop_reason == StopReason::MaxTokens {
                warn!("Response from '{}' hit the token limit", profile.name);
            }

            let text = response.text();
            if !text.is_empty() {
                items.push(RunItem::Message {
                    agent: current,
                    text,
                });
            }

            if !response.has_tool_calls() {
                debug!(
                    "Run completed (turns: {}, tokens: in={} out={})",
                    turns, usage.input_tokens, usage.output_tokens
                );
                return Ok(RunResult {
                    history,
                    last_agent: current,
                    new_items: items,
                    usage,
                });
            }

            let mut results = Vec::new();
            let mut next_agent = None;

            for block in &response.blocks {
                match block {
                    ChatResponseBlock::Text { .. } => {}
                    ChatResponseBlock::ToolCall { id, name, input } => {
                        usage.record_tool_call(name);
                        let output = if let Some(target) = roster.resolve_handoff(current, name) {
                            if next_agent.is_some() {
                                warn!("Ignoring extra handoff {} from '{}'", name, profile.name);
                                MULTIPLE_HANDOFFS.to_string()
                            } else {
                                let target_name = roster.name_of(target);
                                info!("Handoff from '{}' to '{}'", profile.name, target_name);
                                items.push(RunItem::HandoffCall {
                                    agent: current,
                                    tool_call_id: id.clone(),
                                });
                                items.push(RunItem::Handoff {
                                    source: current,
                                    target,
                                });
                                next_agent = Some(target);
                                serde_json::json!({ "assistant": target_name }).to_string()
                            }
                        } else {
                            items.push(RunItem::ToolCall {
                                agent: current,
                                name: name.clone(),
                                input: input.clone(),
                            });
                            let output = self.call_tool(profile, name, input.clone(), context).await;
                            items.push(RunItem::ToolOutput {
                                agent: current,
                                name: name.clone(),
                                output: output.clone(),
                            });
                            output
                        };

                        results.push(ChatBlock::ToolResult {
                            tool_call_id: id.clone(),
                            content: output,
                        });
                    }
                }
            }

            history.push(ChatMessage {
                role: ChatRole::User,
                content: ChatMessageContent::Blocks(results),
            });

            if let Some(target) = next_agent {
                current = target;
            }
        }
    }

    /// Tools offered to an agent: its own tools followed by its handoffs
    fn tool_definitions(
        &self,
        roster: &AgentRoster,
        profile: &AgentProfile,
    ) -> Result<Vec<ToolDefinition>> {
        let mut tools = self.tools.filter_tools(&profile.tools);
        for target in roster.handoff_targets(profile.id)? {
            tools.push(ToolDefinition {
                name: target.handoff_tool_name(),
                description: target.handoff_tool_description(),
                input_schema: json_schema(serde_json::json!({}), vec![]),
            });
        }
        Ok(tools)
    }

    /// Execute a non-handoff tool call; failures become text for the model
    async fn call_tool(
        &self,
        profile: &AgentProfile,
        name: &str,
        input: Value,
        context: &mut C,
    ) -> String {
        if !profile.is_tool_allowed(name) {
            warn!("Agent '{}' called unavailable tool {}", profile.name, name);
            return format!("Error: Tool {} is not available to {}", name, profile.name);
        }

        info!("Executing tool: {}", name);
        let mut output = match self.tools.execute(name, input, context).await {
            Ok(output) => output,
            Err(e) => format!("Error: {}", e),
        };
        truncate_output(&mut output);
        output
    }
}

/// Truncate oversized tool outputs on a char boundary
fn truncate_output(output: &mut String) {
    if output.len() <= MAX_TOOL_OUTPUT {
        return;
    }
    let mut cut = MAX_TOOL_OUTPUT;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    output.truncate(cut);
    output.push_str("\n[Output truncated]");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{MATH_TUTOR, STUDY_COACH, TRIAGE_AGENT};
    use crate::classifier::{TopicCategory, classify};
    use crate::context::StudentContext;
    use crate::providers::{ChatResponse, ChatUsage, StopReason};
    use crate::tools::tutoring::tutoring_registry;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records what each call was offered
    struct ScriptedProvider {
        responses: Mutex<VecDeque<anyhow::Result<ChatResponse>>>,
        calls: Mutex<Vec<(String, Vec<String>, usize)>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().map(Ok).collect()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::from([Err(anyhow!("connection refused"))])),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn tool_names(&self, call: usize) -> Vec<String> {
            self.calls.lock().unwrap()[call].1.clone()
        }

        fn system(&self, call: usize) -> String {
            self.calls.lock().unwrap()[call].0.clone()
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            tools: &[ToolDefinition],
            system: &str,
        ) -> anyhow::Result<ChatResponse> {
            self.calls.lock().unwrap().push((
                system.to_string(),
                tools.iter().map(|t| t.name.clone()).collect(),
                messages.len(),
            ));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(text("out of script")))
        }
    }

    fn text(text: &str) -> ChatResponse {
        ChatResponse {
            blocks: vec![ChatResponseBlock::Text {
                text: text.to_string(),
            }],
            stop_reason: StopReason::EndTurn,
            usage: ChatUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }
    }

    fn calls(calls: &[(&str, &str, Value)]) -> ChatResponse {
        ChatResponse {
            blocks: calls
                .iter()
                .map(|(id, name, input)| ChatResponseBlock::ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.clone(),
                })
                .collect(),
            stop_reason: StopReason::ToolUse,
            usage: ChatUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }
    }

    fn tool_results(message: &ChatMessage) -> Vec<(String, String)> {
        match &message.content {
            ChatMessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ChatBlock::ToolResult {
                        tool_call_id,
                        content,
                    } => Some((tool_call_id.clone(), content.clone())),
                    _ => None,
                })
                .collect(),
            ChatMessageContent::Text(_) => Vec::new(),
        }
    }

    fn setup(
        provider: Arc<ScriptedProvider>,
    ) -> (Runner<StudentContext>, AgentRoster) {
        let runner = Runner::new(provider, tutoring_registry());
        (runner, AgentRoster::tutoring().unwrap())
    }

    #[tokio::test]
    async fn test_triage_hands_off_to_math_tutor() {
        let provider = ScriptedProvider::new(vec![
            calls(&[("h1", "transfer_to_math_tutor", serde_json::json!({}))]),
            calls(&[
                ("t1", "math_explanation_tool", serde_json::json!({"topic": "derivatives"})),
                ("t2", "add_study_note", serde_json::json!({"note": "Review derivatives"})),
            ]),
            text("Let's start with the power rule."),
        ]);
        let (runner, roster) = setup(provider.clone());
        let triage = roster.entry();
        let math = roster.find_by_name(MATH_TUTOR).unwrap();

        let mut ctx = StudentContext::new();
        let result = runner
            .run(&roster, triage, vec![ChatMessage::user("help with derivatives")], &mut ctx)
            .await
            .unwrap();

        assert_eq!(result.last_agent, math);
        assert_eq!(ctx.notes(), ["Review derivatives"]);
        assert_eq!(result.final_output(), Some("Let's start with the power rule."));
        assert_eq!(result.usage.api_calls, 3);
        assert_eq!(result.usage.tool_calls.len(), 3);

        assert_eq!(
            &result.new_items[..2],
            &[
                RunItem::HandoffCall {
                    agent: triage,
                    tool_call_id: "h1".to_string()
                },
                RunItem::Handoff {
                    source: triage,
                    target: math
                },
            ]
        );
        assert!(matches!(
            &result.new_items[2],
            RunItem::ToolCall { agent, name, .. } if *agent == math && name == "math_explanation_tool"
        ));
        assert_eq!(
            result.new_items.last(),
            Some(&RunItem::Message {
                agent: math,
                text: "Let's start with the power rule.".to_string()
            })
        );

        // user, assistant, results, assistant, results, assistant
        assert_eq!(result.history.len(), 6);
        assert_eq!(
            tool_results(&result.history[2]),
            vec![("h1".to_string(), r#"{"assistant":"Math Tutor"}"#.to_string())]
        );
        let math_results = tool_results(&result.history[4]);
        assert_eq!(math_results[0].1, classify(TopicCategory::Math, "derivatives"));
        assert!(math_results[0].1.starts_with("Derivatives measure the rate of change"));
        assert_eq!(math_results[1].1, "Added note: Review derivatives");

        // Triage sees only handoff tools; the math tutor sees its tools plus the way back
        assert_eq!(
            provider.tool_names(0),
            vec!["transfer_to_math_tutor", "transfer_to_writing_tutor", "transfer_to_study_coach"]
        );
        assert_eq!(
            provider.tool_names(1),
            vec!["math_explanation_tool", "add_study_note", "transfer_to_triage_agent"]
        );
        assert!(provider.system(1).contains("expert math tutor"));
    }

    #[tokio::test]
    async fn test_text_alongside_tool_calls_is_one_message() {
        let mut mixed = calls(&[("s1", "study_strategy_tool", serde_json::json!({"study_topic": "focus"}))]);
        mixed.blocks.insert(0, ChatResponseBlock::Text { text: "Let me look that up.".to_string() });
        mixed.blocks.push(ChatResponseBlock::Text { text: "One moment.".to_string() });
        let mut truncated = text("Try the Pomodoro");
        truncated.stop_reason = StopReason::MaxTokens;

        let provider = ScriptedProvider::new(vec![mixed, truncated]);
        let (runner, roster) = setup(provider.clone());
        let study = roster.find_by_name(STUDY_COACH).unwrap();
        let mut ctx = StudentContext::new();

        let result = runner
            .run(&roster, study, vec![ChatMessage::user("focus tips")], &mut ctx)
            .await
            .unwrap();

        // The tool call still runs even though the response also carried text
        assert_eq!(provider.call_count(), 2);
        let messages: Vec<&str> = result
            .new_items
            .iter()
            .filter_map(|i| match i {
                RunItem::Message { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(messages, ["Let me look that up.\nOne moment.", "Try the Pomodoro"]);
        assert_eq!(result.final_output(), Some("Try the Pomodoro"));
    }

    #[tokio::test]
    async fn test_only_first_handoff_is_honoured() {
        let provider = ScriptedProvider::new(vec![
            calls(&[
                ("h1", "transfer_to_study_coach", serde_json::json!({})),
                ("h2", "transfer_to_math_tutor", serde_json::json!({})),
            ]),
            text("Let's plan your week."),
        ]);
        let (runner, roster) = setup(provider);
        let mut ctx = StudentContext::new();

        let result = runner
            .run(&roster, roster.entry(), vec![ChatMessage::user("hi")], &mut ctx)
            .await
            .unwrap();

        assert_eq!(result.last_agent, roster.find_by_name(STUDY_COACH).unwrap());
        let handoffs = result
            .new_items
            .iter()
            .filter(|i| matches!(i, RunItem::Handoff { .. }))
            .count();
        assert_eq!(handoffs, 1);
        let results = tool_results(&result.history[2]);
        assert_eq!(results[1], ("h2".to_string(), MULTIPLE_HANDOFFS.to_string()));
    }

    #[tokio::test]
    async fn test_illegal_handoff_and_unlisted_tool_are_errors() {
        let provider = ScriptedProvider::new(vec![
            calls(&[
                ("x1", "transfer_to_study_coach", serde_json::json!({})),
                ("x2", "writing_feedback_tool", serde_json::json!({"writing_type": "essay"})),
                ("x3", "no_such_tool", serde_json::json!({})),
            ]),
            text("Sorry about that."),
        ]);
        let (runner, roster) = setup(provider);
        let math = roster.find_by_name(MATH_TUTOR).unwrap();
        let mut ctx = StudentContext::new();

        let result = runner
            .run(&roster, math, vec![ChatMessage::user("hi")], &mut ctx)
            .await
            .unwrap();

        assert_eq!(result.last_agent, math);
        for (_, output) in tool_results(&result.history[2]) {
            assert!(output.starts_with("Error: "), "{}", output);
        }
        assert!(
            !result
                .new_items
                .iter()
                .any(|i| matches!(i, RunItem::Handoff { .. }))
        );
    }

    #[tokio::test]
    async fn test_tool_failure_is_reported_to_model() {
        let provider = ScriptedProvider::new(vec![
            calls(&[("n1", "add_study_note", serde_json::json!({"text": "wrong key"}))]),
            text("Noted."),
        ]);
        let (runner, roster) = setup(provider);
        let study = roster.find_by_name(STUDY_COACH).unwrap();
        let mut ctx = StudentContext::new();

        let result = runner
            .run(&roster, study, vec![ChatMessage::user("note it")], &mut ctx)
            .await
            .unwrap();

        assert!(ctx.notes().is_empty());
        assert_eq!(
            result.new_items[1],
            RunItem::ToolOutput {
                agent: study,
                name: "add_study_note".to_string(),
                output: "Error: Missing 'note' parameter".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_max_turns_exceeded() {
        let looping: Vec<ChatResponse> = (0..5)
            .map(|_| calls(&[("t", "study_strategy_tool", serde_json::json!({"study_topic": "focus"}))]))
            .collect();
        let provider = ScriptedProvider::new(looping);
        let (runner, roster) = setup(provider.clone());
        let runner = runner.with_max_turns(3);
        let study = roster.find_by_name(STUDY_COACH).unwrap();
        let mut ctx = StudentContext::new();

        let err = runner
            .run(&roster, study, vec![ChatMessage::user("hi")], &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::MaxTurnsExceeded(3)));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let (runner, roster) = setup(ScriptedProvider::failing());
        let mut ctx = StudentContext::new();
        let err = runner
            .run(&roster, roster.entry(), vec![ChatMessage::user("hi")], &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Provider(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_student_context_reaches_system_prompt() {
        let provider = ScriptedProvider::new(vec![text("Hello Ada!")]);
        let (runner, roster) = setup(provider.clone());
        let mut ctx = StudentContext::new()
            .with_student_name("Ada")
            .with_current_subject("calculus");

        let result = runner
            .run(&roster, roster.entry(), vec![ChatMessage::user("hi")], &mut ctx)
            .await
            .unwrap();

        assert_eq!(roster.name_of(result.last_agent), TRIAGE_AGENT);
        let system = provider.system(0);
        assert!(system.contains("Student name: Ada"));
        assert!(system.contains("Current subject: calculus"));
    }

    #[tokio::test]
    async fn test_unknown_start_agent() {
        let provider = ScriptedProvider::new(vec![]);
        let (runner, roster) = setup(provider);
        let mut ctx = StudentContext::new();
        let err = runner
            .run(&roster, AgentId(42), Vec::new(), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Roster(_)));
    }

    #[test]
    fn test_truncate_output() {
        let mut short = "fine".to_string();
        truncate_output(&mut short);
        assert_eq!(short, "fine");

        let mut long = "é".repeat(MAX_TOOL_OUTPUT);
        truncate_output(&mut long);
        assert!(long.ends_with("\n[Output truncated]"));
        assert!(long.len() <= MAX_TOOL_OUTPUT + "\n[Output truncated]".len());
    }
}
