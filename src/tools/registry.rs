//! Tool registry with typed parameter declarations
//!
//! Immutable mapping from tool name to a typed handler record. Built once at
//! startup; duplicate names are rejected at construction, not at call time.
//!
//! Tools:
//! - read_file: Read file contents
//! - write_file: Write content to a file
//! - list_directory: List directory contents

use crate::errors::{AgentError, Result};
use crate::tools::implementations;
use crate::tools::security::SandboxPath;
use crate::tools::types::{ToolContext, ToolError, ToolOutput, ToolSchema};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// String resolved through the sandbox before the handler runs
    Path,
    /// Free-form string
    Text,
    /// Boolean
    Flag,
}

impl ParamKind {
    /// JSON Schema type name
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamKind::Path | ParamKind::Text => "string",
            ParamKind::Flag => "boolean",
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// A validated argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Path(SandboxPath),
    Text(String),
    Flag(bool),
}

/// Arguments after schema validation and path resolution
#[derive(Debug, Clone, Default)]
pub struct ToolArgs {
    values: HashMap<&'static str, ArgValue>,
}

impl ToolArgs {
    pub(crate) fn insert(&mut self, name: &'static str, value: ArgValue) {
        self.values.insert(name, value);
    }

    /// Resolved path argument
    pub fn path(&self, name: &str) -> std::result::Result<&SandboxPath, ToolError> {
        match self.values.get(name) {
            Some(ArgValue::Path(path)) => Ok(path),
            _ => Err(missing(name)),
        }
    }

    /// String argument
    pub fn text(&self, name: &str) -> std::result::Result<&str, ToolError> {
        match self.values.get(name) {
            Some(ArgValue::Text(text)) => Ok(text),
            _ => Err(missing(name)),
        }
    }

    /// Optional boolean argument, false when absent
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(ArgValue::Flag(true)))
    }
}

fn missing(name: &str) -> ToolError {
    ToolError::Argument {
        message: format!("missing argument '{}'", name),
    }
}

/// Handler signature: validated args in, bounded output or tool error out
pub type ToolHandler =
    fn(&ToolArgs, &ToolContext) -> std::result::Result<ToolOutput, ToolError>;

/// Typed handler record
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    /// Whether tool leaves the sandbox unchanged
    pub read_only: bool,
    pub handler: ToolHandler,
}

impl ToolSpec {
    /// Find a declared parameter
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON schema advertised to the model
    pub fn schema(&self) -> ToolSchema {
        let mut properties = Map::new();
        for param in &self.params {
            properties.insert(
                param.name.to_string(),
                json!({
                    "type": param.kind.json_type(),
                    "description": param.description,
                }),
            );
        }

        let required: Vec<Value> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::String(p.name.to_string()))
            .collect();

        ToolSchema {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            }),
            read_only: self.read_only,
        }
    }
}

/// Tool registry
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    /// Map of tool name to handler record
    tools: BTreeMap<&'static str, ToolSpec>,
}

impl ToolRegistry {
    /// Build registry, rejecting duplicate tool or parameter names
    pub fn new(specs: Vec<ToolSpec>) -> Result<Self> {
        let mut tools = BTreeMap::new();

        for spec in specs {
            let mut seen = HashSet::new();
            for param in &spec.params {
                if !seen.insert(param.name) {
                    return Err(AgentError::ConfigError(format!(
                        "Tool '{}' declares parameter '{}' twice",
                        spec.name, param.name
                    )));
                }
            }

            if tools.contains_key(spec.name) {
                return Err(AgentError::ConfigError(format!(
                    "Duplicate tool name: {}",
                    spec.name
                )));
            }
            tools.insert(spec.name, spec);
        }

        Ok(Self { tools })
    }

    /// Registry with the built-in filesystem tools
    pub fn builtin() -> Result<Self> {
        Self::new(vec![read_file_spec(), write_file_spec(), list_directory_spec()])
    }

    /// Get tool record by name
    pub fn lookup(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Get all tool schemas
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(ToolSpec::schema).collect()
    }

    /// Get total number of tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn read_file_spec() -> ToolSpec {
    ToolSpec {
        name: "read_file",
        description: "Read the text content of one file inside the sandbox",
        params: vec![ParamSpec::required(
            "path",
            ParamKind::Path,
            "File path relative to the sandbox root",
        )],
        read_only: true,
        handler: implementations::read_file,
    }
}

fn write_file_spec() -> ToolSpec {
    ToolSpec {
        name: "write_file",
        description: "Create or overwrite a text file inside the sandbox; missing parent directories are created",
        params: vec![
            ParamSpec::required(
                "path",
                ParamKind::Path,
                "File path relative to the sandbox root",
            ),
            ParamSpec::required("content", ParamKind::Text, "Full content to write"),
        ],
        read_only: false,
        handler: implementations::write_file,
    }
}

fn list_directory_spec() -> ToolSpec {
    ToolSpec {
        name: "list_directory",
        description: "List files and directories at a path inside the sandbox",
        params: vec![
            ParamSpec::required(
                "path",
                ParamKind::Path,
                "Directory path relative to the sandbox root ('.' for the root)",
            ),
            ParamSpec::optional(
                "recursive",
                ParamKind::Flag,
                "Whether to list subdirectories recursively (default false)",
            ),
        ],
        read_only: true,
        handler: implementations::list_directory,
    }
}
