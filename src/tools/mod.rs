//! Sandboxed tool layer
//!
//! Provides file tools confined to one sandbox root:
//! - 3 built-in tools (read_file, write_file, list_directory)
//! - Sandbox path resolution (canonical containment check)
//! - Typed, immutable registry
//! - Executor that turns every failure into a tool result

pub mod types;
pub mod registry;
pub mod security;
pub mod executor;
pub mod runtime;
pub mod implementations;

// Re-export commonly used types
pub use types::{ToolCallRequest, ToolContext, ToolError, ToolOutcome, ToolOutput, ToolResult, ToolSchema};
pub use registry::{ToolRegistry, ToolSpec};
pub use security::{SandboxPath, SandboxResolver};
pub use executor::ToolExecutor;
pub use runtime::ToolRuntime;
