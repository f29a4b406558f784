//! Tool execution types and structures
//!
//! Core types for tool requests, results, and the recoverable tool error
//! taxonomy that gets folded back into the conversation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Default truncation threshold for tool output (≈ 65536 tokens)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 262_144;

/// Default cap on `write_file` content
pub const DEFAULT_MAX_WRITE_BYTES: usize = 2_097_152; // 2MB

/// A structured request from the model to run one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call id, unique within a conversation once assigned by the loop
    pub id: String,

    /// Registry name of the tool
    pub name: String,

    /// Raw arguments as emitted by the model
    pub arguments: Map<String, Value>,

    /// Model-side signature carried back verbatim on the next request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl ToolCallRequest {
    /// Create request from a JSON object of arguments
    ///
    /// Non-object argument payloads become an empty map so that argument
    /// validation reports the missing parameters.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            id: String::new(),
            name: name.into(),
            arguments,
            thought_signature: None,
        }
    }

    /// Set the call id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Recoverable tool-level failure
///
/// Every variant is reported back to the model as tool output; none of them
/// ends the agent run.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolError {
    #[error("Path escapes sandbox: {path}")]
    PathEscape { path: String },

    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid arguments: {message}")]
    Argument { message: String },

    #[error("I/O failure: {message}")]
    ToolIo { message: String },
}

impl ToolError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::PathEscape { .. } => "path_escape",
            ToolError::InvalidPath { .. } => "invalid_path",
            ToolError::UnknownTool { .. } => "unknown_tool",
            ToolError::Argument { .. } => "argument",
            ToolError::ToolIo { .. } => "tool_io",
        }
    }

    /// Map an underlying I/O failure to a human-readable tool error
    pub fn from_io(action: &str, path: &str, err: &std::io::Error) -> Self {
        let reason = match err.kind() {
            std::io::ErrorKind::NotFound => "no such file or directory".to_string(),
            std::io::ErrorKind::PermissionDenied => "permission denied".to_string(),
            std::io::ErrorKind::InvalidData => "file is not valid UTF-8 text".to_string(),
            _ => err.to_string(),
        };

        ToolError::ToolIo {
            message: format!("Failed to {} {}: {}", action, path, reason),
        }
    }
}

/// Successful tool output, bounded in size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Output text handed back to the model
    pub content: String,

    /// Whether `content` was cut at the output threshold
    #[serde(default)]
    pub truncated: bool,
}

impl ToolOutput {
    /// Wrap output that is already known to be within bounds
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            truncated: false,
        }
    }

    /// Wrap output, truncating at a char boundary past `max_bytes`
    pub fn bounded(content: String, max_bytes: usize) -> Self {
        Self::bounded_with_total(content, max_bytes, None)
    }

    /// Like [`ToolOutput::bounded`], reporting `total_bytes` in the marker when
    /// the caller only read a prefix of the source.
    pub fn bounded_with_total(
        mut content: String,
        max_bytes: usize,
        total_bytes: Option<u64>,
    ) -> Self {
        let total = total_bytes.unwrap_or(content.len() as u64);

        if content.len() <= max_bytes && total <= content.len() as u64 {
            return Self::new(content);
        }

        let mut cut = max_bytes.min(content.len());
        while cut > 0 && !content.is_char_boundary(cut) {
            cut -= 1;
        }
        content.truncate(cut);
        content.push_str(&format!(
            "\n[... truncated: showed {} of {} bytes]",
            cut, total
        ));

        Self {
            content,
            truncated: true,
        }
    }
}

/// Outcome of one tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { output: ToolOutput },
    Failure { error: ToolError },
}

/// Result of tool execution, paired with its request by `call_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the request that produced this result
    pub call_id: String,

    /// Tool name that was executed
    pub tool: String,

    /// Output or error
    pub outcome: ToolOutcome,

    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

impl ToolResult {
    /// Create successful result
    pub fn success(call_id: String, tool: String, output: ToolOutput, duration: Duration) -> Self {
        Self {
            call_id,
            tool,
            outcome: ToolOutcome::Success { output },
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Create failed result
    pub fn failure(call_id: String, tool: String, error: ToolError, duration: Duration) -> Self {
        Self {
            call_id,
            tool,
            outcome: ToolOutcome::Failure { error },
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    pub fn output(&self) -> Option<&ToolOutput> {
        match &self.outcome {
            ToolOutcome::Success { output } => Some(output),
            ToolOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ToolError> {
        match &self.outcome {
            ToolOutcome::Success { .. } => None,
            ToolOutcome::Failure { error } => Some(error),
        }
    }

    /// Payload handed to the model as the function response
    pub fn response_payload(&self) -> Value {
        match &self.outcome {
            ToolOutcome::Success { output } => serde_json::json!({
                "content": output.content,
                "truncated": output.truncated,
            }),
            ToolOutcome::Failure { error } => serde_json::json!({
                "error": {
                    "kind": error.kind(),
                    "message": error.to_string(),
                }
            }),
        }
    }
}

/// Tool execution context with resource bounds
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Output size above which results are truncated (bytes)
    pub max_output_bytes: usize,

    /// Maximum content accepted by `write_file` (bytes)
    pub max_write_bytes: usize,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_write_bytes: DEFAULT_MAX_WRITE_BYTES,
        }
    }
}

impl ToolContext {
    /// Set max output size
    pub fn with_max_output_bytes(mut self, size: usize) -> Self {
        self.max_output_bytes = size;
        self
    }

    /// Set max write size
    pub fn with_max_write_bytes(mut self, size: usize) -> Self {
        self.max_write_bytes = size;
        self
    }
}

/// Tool schema definition, as advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Parameter schema (JSON Schema)
    pub parameters: Value,

    /// Whether tool is read-only
    pub read_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success(
            "call-1-0".to_string(),
            "read_file".to_string(),
            ToolOutput::new("output"),
            Duration::from_millis(100),
        );

        assert!(result.is_success());
        assert_eq!(result.tool, "read_file");
        assert_eq!(result.output().unwrap().content, "output");
        assert_eq!(result.duration_ms, 100);
        assert!(result.error().is_none());
    }

    #[test]
    fn test_tool_result_failure() {
        let result = ToolResult::failure(
            "call-1-0".to_string(),
            "nope".to_string(),
            ToolError::UnknownTool {
                name: "nope".to_string(),
            },
            Duration::from_millis(0),
        );

        assert!(!result.is_success());
        assert_eq!(result.error().unwrap().kind(), "unknown_tool");
        let payload = result.response_payload();
        assert_eq!(payload["error"]["kind"], "unknown_tool");
    }

    #[test]
    fn test_request_non_object_arguments() {
        let request = ToolCallRequest::new("read_file", json!("a.txt"));
        assert!(request.arguments.is_empty());
        assert!(request.id.is_empty());
    }

    #[test]
    fn test_bounded_output_under_threshold() {
        let output = ToolOutput::bounded("short".to_string(), 10);
        assert!(!output.truncated);
        assert_eq!(output.content, "short");
    }

    #[test]
    fn test_bounded_output_truncates_with_marker() {
        let output = ToolOutput::bounded("a".repeat(100), 10);
        assert!(output.truncated);
        assert!(output.content.starts_with(&"a".repeat(10)));
        assert!(output.content.contains("showed 10 of 100 bytes"));
    }

    #[test]
    fn test_bounded_output_respects_char_boundary() {
        // "é" is two bytes; a 3-byte cut lands mid-char
        let output = ToolOutput::bounded("ééé".to_string(), 3);
        assert!(output.truncated);
        assert!(output.content.starts_with("é\n"));
    }

    #[test]
    fn test_tool_error_roundtrip_json() {
        let err = ToolError::PathEscape {
            path: "../etc".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "path_escape");
        let back: ToolError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_tool_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ToolError::from_io("read", "missing.txt", &io);
        assert_eq!(err.kind(), "tool_io");
        assert!(err.to_string().contains("missing.txt"));
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn test_tool_context_builder() {
        let ctx = ToolContext::default()
            .with_max_output_bytes(1024)
            .with_max_write_bytes(2048);

        assert_eq!(ctx.max_output_bytes, 1024);
        assert_eq!(ctx.max_write_bytes, 2048);
    }
}
