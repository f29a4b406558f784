//! Type definitions module
//!
//! Conversation turns and model replies.

pub mod messages;

// Re-export commonly used types
pub use messages::{Conversation, ModelReply, Turn};

// Turn execution report
pub mod execution;
pub use execution::TurnReport;
