//! Error types for tutor-core

use thiserror::Error;

use crate::agents::AgentId;

/// Roster construction and validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    /// Two agents share a display name
    #[error("duplicate agent name: {0}")]
    DuplicateName(String),

    /// A handoff points at an id the roster does not own
    #[error("agent '{agent}' hands off to unknown {target}")]
    UnknownHandoff { agent: String, target: AgentId },

    /// An agent lists itself as a handoff target
    #[error("agent '{0}' hands off to itself")]
    SelfHandoff(String),

    /// Two handoff targets of one agent map to the same tool name
    #[error("agent '{agent}' has conflicting handoff tool '{tool}'")]
    ConflictingHandoffTool { agent: String, tool: String },

    /// Lookup of an id the roster does not own
    #[error("unknown {0}")]
    UnknownAgent(AgentId),
}

/// Agent runtime errors
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The model kept calling tools past the turn limit
    #[error("max turns ({0}) exceeded")]
    MaxTurnsExceeded(usize),

    /// The run started from an agent the roster does not own
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// Model provider failure
    #[error("model call failed: {0:#}")]
    Provider(anyhow::Error),
}

/// Failure talking to a model provider over HTTP
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API answered with a non-success status
    #[error("{provider} API returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response, or the body could not be read
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: String,
        source: reqwest::Error,
    },

    /// The response parsed but lacks what a chat reply needs
    #[error("{provider} response was malformed: {detail}")]
    Malformed { provider: String, detail: String },
}

impl ProviderError {
    /// Rate limits, server errors and timeouts are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            Self::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Malformed { .. } => false,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RunnerError>;
