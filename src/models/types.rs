//! Type definitions for Gemini models
//!
//! Valid model names plus the `generateContent` wire structures.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Models a chat may be configured with
pub const VALID_MODELS: &[&str] = &["gemini-2.5-pro", "gemini-2.5-flash", "gemini-2.5-flash-lite"];

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Small model used to name new chats
pub const TITLE_MODEL: &str = "gemini-2.5-flash-lite";

/// Default Generative Language API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Check a model name against the valid list
pub fn is_valid_model(name: &str) -> bool {
    VALID_MODELS.contains(&name)
}

/// Information about a selectable model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name (e.g., "gemini-2.5-flash")
    pub name: String,

    /// Whether this is the configured default
    pub is_default: bool,
}

impl ModelInfo {
    /// All valid models, marking the given default
    pub fn catalog(default_model: &str) -> Vec<ModelInfo> {
        VALID_MODELS
            .iter()
            .map(|name| ModelInfo {
                name: name.to_string(),
                is_default: *name == default_model,
            })
            .collect()
    }
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default {
            write!(f, "{} (default)", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Request body for `models/{model}:generateContent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclarations>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

/// One role-tagged content block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: &str, parts: Vec<Part>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

/// One part of a content block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,

    /// Set on thinking-model reasoning parts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,

    /// Opaque signature a thinking model attaches to its function calls;
    /// must be echoed back with the call in later requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Self {
            function_call: Some(FunctionCall {
                name: name.into(),
                args,
            }),
            ..Default::default()
        }
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response,
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,

    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclarations {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Response body of `generateContent`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}
