//! Anthropic Messages API provider

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::http;
use super::types::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponse, ChatResponseBlock, ChatRole,
    ChatUsage, LlmProvider, StopReason, ToolDefinition,
};

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "anthropic";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, base_url: String, max_tokens: u32) -> Result<Self> {
        Ok(Self {
            client: http::client()?,
            api_key,
            base_url: http::normalize_base_url(&base_url),
            model,
            max_tokens,
        })
    }

    fn request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        tools: &'a [ToolDefinition],
        system: &'a str,
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            // System text travels in `system`, never as a message
            messages: messages
                .iter()
                .filter(|m| m.role != ChatRole::System)
                .map(WireMessage::from)
                .collect(),
            tools: (!tools.is_empty()).then_some(tools),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse> {
        let body = self.request(messages, tools, system);
        debug!(
            "Anthropic request: model={}, messages={}, tools={}",
            self.model,
            body.messages.len(),
            tools.len()
        );

        let request = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let reply: MessagesResponse = http::send_json(PROVIDER, request).await?;

        debug!("Anthropic stop_reason={:?}", reply.stop_reason);
        Ok(reply.into())
    }
}

// Request side borrows from history; nothing is cloned per call.

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Blocks(Vec<WireBlock<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock<'a> {
    Text {
        text: &'a str,
    },
    ToolUse {
        id: &'a str,
        name: &'a str,
        input: &'a Value,
    },
    ToolResult {
        tool_use_id: &'a str,
        content: &'a str,
    },
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        let role = match message.role {
            ChatRole::Assistant => "assistant",
            ChatRole::User | ChatRole::System => "user",
        };
        let content = match &message.content {
            ChatMessageContent::Text(text) => WireContent::Text(text),
            ChatMessageContent::Blocks(blocks) => {
                WireContent::Blocks(blocks.iter().map(WireBlock::from).collect())
            }
        };
        Self { role, content }
    }
}

impl<'a> From<&'a ChatBlock> for WireBlock<'a> {
    fn from(block: &'a ChatBlock) -> Self {
        match block {
            ChatBlock::Text { text } => Self::Text { text },
            ChatBlock::ToolCall { id, name, input } => Self::ToolUse { id, name, input },
            ChatBlock::ToolResult {
                tool_call_id,
                content,
            } => Self::ToolResult {
                tool_use_id: tool_call_id,
                content,
            },
        }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ReplyBlock>,
    stop_reason: Option<String>,
    usage: ReplyUsage,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplyBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// Thinking and other block kinds the runner has no use for
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ReplyUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl From<MessagesResponse> for ChatResponse {
    fn from(reply: MessagesResponse) -> Self {
        let blocks = reply
            .content
            .into_iter()
            .filter_map(|block| match block {
                ReplyBlock::Text { text } => Some(ChatResponseBlock::Text { text }),
                ReplyBlock::ToolUse { id, name, input } => {
                    Some(ChatResponseBlock::ToolCall { id, name, input })
                }
                ReplyBlock::Other => None,
            })
            .collect();

        let stop_reason = match reply.stop_reason.as_deref() {
            Some("tool_use") => StopReason::ToolUse,
            Some("end_turn" | "stop_sequence") => StopReason::EndTurn,
            Some("max_tokens") => StopReason::MaxTokens,
            _ => StopReason::Unknown,
        };

        ChatResponse {
            blocks,
            stop_reason,
            usage: ChatUsage {
                input_tokens: reply.usage.input_tokens,
                output_tokens: reply.usage.output_tokens,
            },
        }
    }
}
