//! Error types for GeminiBuddy
//!
//! Run-level failures that end an agent turn. Tool-level failures never
//! appear here: they are folded back into the conversation as
//! [`ToolError`](crate::tools::ToolError) results.

use crate::types::Conversation;
use thiserror::Error;

/// Main error type for the GeminiBuddy agent system
#[derive(Error, Debug)]
pub enum AgentError {
    /// Iteration budget spent without a final answer
    #[error("Agent loop exhausted after {iterations} iterations without a final answer")]
    LoopExhausted {
        iterations: usize,
        transcript: Box<Conversation>,
    },

    /// Caller cancelled the run at an iteration boundary
    #[error("Agent run cancelled after {iterations} iterations")]
    Cancelled {
        iterations: usize,
        transcript: Box<Conversation>,
    },

    /// State machine transition errors
    #[error("Invalid state transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    /// Gemini API errors
    #[error("Gemini API error: {0}")]
    ModelApi(String),

    /// Gemini quota exhausted (HTTP 429)
    #[error("Gemini rate limit exceeded: {0}")]
    RateLimited(String),

    /// Prompt or response blocked by safety filters
    #[error("Response blocked by safety filters: {0}")]
    ModelBlocked(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Chat store errors
    #[error("Chat store error: {0}")]
    StoreError(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic errors with context
    #[error("Agent error: {0}")]
    Generic(String),
}

impl AgentError {
    /// Partial transcript for errors that end a run mid-way
    pub fn transcript(&self) -> Option<&Conversation> {
        match self {
            AgentError::LoopExhausted { transcript, .. }
            | AgentError::Cancelled { transcript, .. } => Some(transcript),
            _ => None,
        }
    }

    /// Whether the failure came from the model call itself
    pub fn is_model_failure(&self) -> bool {
        matches!(
            self,
            AgentError::ModelApi(_)
                | AgentError::RateLimited(_)
                | AgentError::ModelBlocked(_)
                | AgentError::HttpError(_)
        )
    }
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Convert anyhow errors to AgentError
impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Generic(err.to_string())
    }
}
