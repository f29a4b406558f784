//! Tool executor
//!
//! Runs one tool call end to end and always yields a [`ToolResult`]:
//! 1. Registry lookup (miss → `UnknownTool`)
//! 2. Argument validation against declared parameters (→ `Argument`)
//! 3. Sandbox resolution of every path parameter (→ `PathEscape` / `InvalidPath`)
//! 4. Handler invocation (I/O failures → `ToolIo`)
//! 5. Output bounding
//!
//! Exactly one filesystem operation per call; no retries.

use crate::tools::registry::{ArgValue, ParamKind, ToolArgs, ToolRegistry, ToolSpec};
use crate::tools::security::SandboxResolver;
use crate::tools::types::{ToolCallRequest, ToolContext, ToolError, ToolOutput, ToolResult};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

/// Sequential tool executor bound to one sandbox
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    /// Tool registry
    registry: ToolRegistry,

    /// Path resolver for the sandbox root
    resolver: SandboxResolver,

    /// Tool context
    context: ToolContext,
}

impl ToolExecutor {
    /// Create new executor
    pub fn new(registry: ToolRegistry, resolver: SandboxResolver, context: ToolContext) -> Self {
        Self {
            registry,
            resolver,
            context,
        }
    }

    /// Execute a single tool call
    pub fn execute(&self, request: &ToolCallRequest) -> ToolResult {
        let start = Instant::now();

        let outcome = self.execute_once(request);
        let duration = start.elapsed();

        let result = match outcome {
            Ok(output) => ToolResult::success(
                request.id.clone(),
                request.name.clone(),
                output,
                duration,
            ),
            Err(error) => {
                debug!(tool = %request.name, call_id = %request.id, error = %error, "tool call failed");
                ToolResult::failure(request.id.clone(), request.name.clone(), error, duration)
            }
        };

        info!(
            tool = %result.tool,
            call_id = %result.call_id,
            duration_ms = result.duration_ms,
            success = result.is_success(),
            "tool executed"
        );

        result
    }

    fn execute_once(&self, request: &ToolCallRequest) -> Result<ToolOutput, ToolError> {
        let spec = self
            .registry
            .lookup(&request.name)
            .ok_or_else(|| ToolError::UnknownTool {
                name: request.name.clone(),
            })?;

        let args = self.bind_arguments(spec, request)?;
        let output = (spec.handler)(&args, &self.context)?;

        if !output.truncated && output.content.len() > self.context.max_output_bytes {
            return Ok(ToolOutput::bounded(output.content, self.context.max_output_bytes));
        }

        Ok(output)
    }

    /// Validate raw arguments, then resolve declared paths
    fn bind_arguments(&self, spec: &ToolSpec, request: &ToolCallRequest) -> Result<ToolArgs, ToolError> {
        if let Some(extra) = request.arguments.keys().find(|key| spec.param(key).is_none()) {
            return Err(ToolError::Argument {
                message: format!("unexpected argument '{}' for {}", extra, spec.name),
            });
        }

        let mut checked = Vec::with_capacity(spec.params.len());
        for param in &spec.params {
            let value = match request.arguments.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ToolError::Argument {
                        message: format!("missing required argument '{}' for {}", param.name, spec.name),
                    });
                }
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };

            let typed = match (param.kind, value) {
                (ParamKind::Path, Value::String(s)) | (ParamKind::Text, Value::String(s)) => {
                    ArgValue::Text(s.clone())
                }
                (ParamKind::Flag, Value::Bool(b)) => ArgValue::Flag(*b),
                (kind, _) => {
                    return Err(ToolError::Argument {
                        message: format!(
                            "argument '{}' for {} must be a {}",
                            param.name,
                            spec.name,
                            kind.json_type()
                        ),
                    });
                }
            };
            checked.push((param, typed));
        }

        let mut args = ToolArgs::default();
        for (param, value) in checked {
            let value = match (param.kind, value) {
                (ParamKind::Path, ArgValue::Text(raw)) => ArgValue::Path(self.resolver.resolve(&raw)?),
                (_, value) => value,
            };
            args.insert(param.name, value);
        }

        Ok(args)
    }

    /// Get registry reference
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Get resolver reference
    pub fn resolver(&self) -> &SandboxResolver {
        &self.resolver
    }
}
