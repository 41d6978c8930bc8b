//! Multi-provider LLM abstraction layer
//!
//! Supports Anthropic and any OpenAI-compatible endpoint. Providers implement
//! the [`LlmProvider`] trait and are composed via [`ModelRouter`] for
//! automatic failover.

pub mod anthropic;
mod http;
pub mod openai;
pub mod router;
pub mod types;

pub use anthropic::{AnthropicProvider, DEFAULT_ANTHROPIC_BASE_URL};
pub use openai::{DEFAULT_OPENAI_BASE_URL, OpenAiProvider};
pub use router::ModelRouter;
pub use types::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponse, ChatResponseBlock, ChatRole,
    ChatUsage, LlmProvider, StopReason, ToolDefinition,
};
