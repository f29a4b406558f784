//! GeminiBuddy - Gemini chat agent with sandboxed file tools
//!
//! The model may ask to read, write, or list files; every request is run
//! against a single sandbox directory and its result is fed back to the
//! model until it produces a final answer or the iteration cap is hit.
//!
//! # Architecture
//!
//! - **tools**: sandbox path resolver, typed registry, executor
//! - **agent**: turn loop state machine and controller
//! - **models**: `ModelClient` trait and the Gemini client
//! - **session**: chat persistence
//! - **execution**: one user turn, store to loop and back

pub mod errors;
pub mod types;
pub mod tools;
pub mod agent;
pub mod models;
pub mod session;

// Re-export commonly used types
pub use errors::{AgentError, Result};

// CLI, configuration, logging
pub mod cli;
pub mod telemetry;

// Shared execution logic
pub mod execution;
pub use execution::execute_user_turn;
