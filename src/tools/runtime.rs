//! Tool runtime coordinator
//!
//! Owns the registry, the sandbox resolver, and the executor for one sandbox
//! root. The root is fixed at construction and threaded explicitly into
//! every call; nothing reads it from global state.

use crate::errors::Result;
use crate::tools::executor::ToolExecutor;
use crate::tools::registry::ToolRegistry;
use crate::tools::security::SandboxResolver;
use crate::tools::types::{ToolCallRequest, ToolContext, ToolResult, ToolSchema};
use std::path::Path;
use std::sync::Arc;

/// Tool runtime coordinator
#[derive(Debug, Clone)]
pub struct ToolRuntime {
    executor: Arc<ToolExecutor>,
}

impl ToolRuntime {
    /// Create tool runtime with built-in tools and default bounds
    pub fn new(sandbox_root: impl AsRef<Path>) -> Result<Self> {
        Self::with_context(sandbox_root, ToolContext::default())
    }

    /// Create tool runtime with custom bounds
    pub fn with_context(sandbox_root: impl AsRef<Path>, context: ToolContext) -> Result<Self> {
        let resolver = SandboxResolver::new(sandbox_root)?;
        let registry = ToolRegistry::builtin()?;

        Ok(Self {
            executor: Arc::new(ToolExecutor::new(registry, resolver, context)),
        })
    }

    /// Execute one tool call; never fails, errors are carried in the result
    pub fn execute(&self, request: &ToolCallRequest) -> ToolResult {
        self.executor.execute(request)
    }

    /// Get tool registry
    pub fn registry(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    /// Schemas advertised to the model
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry().schemas()
    }

    /// Canonical sandbox root
    pub fn sandbox_root(&self) -> &Path {
        self.executor.resolver().root()
    }
}
