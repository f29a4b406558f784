//! Agent orchestration module
//!
//! Turn loop state machine and controller.

pub mod state;
pub mod orchestrator;

// Re-export commonly used types
pub use state::{LoopEvent, LoopPhase};
pub use orchestrator::{LoopState, TurnLoop, DEFAULT_MAX_ITERATIONS};
