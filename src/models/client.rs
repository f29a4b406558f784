//! Gemini API client
//!
//! Implements [`ModelClient`] over the `generateContent` endpoint:
//! - Assembles the conversation into role-tagged contents
//! - Advertises registry tools as function declarations
//! - Classifies the reply as a final answer or an ordered tool-call batch

use crate::errors::{AgentError, Result};
use crate::models::types::{
    is_valid_model, Content, FunctionDeclaration, GenerateContentRequest, GenerateContentResponse,
    Part, ToolDeclarations, DEFAULT_API_BASE_URL, VALID_MODELS,
};
use crate::tools::{ToolCallRequest, ToolSchema};
use crate::types::{Conversation, ModelReply, Turn};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Default request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant with file tools. \
All tool paths are relative to a sandbox directory; you cannot access anything outside it. \
When a tool returns an error, read it and adjust your next call instead of repeating it.";

/// Finish reasons that mean the candidate was withheld
const BLOCKED_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII", "RECITATION"];

/// Model call consumed by the turn loop
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the full conversation with the available tools
    async fn send(&self, conversation: &Conversation, tools: &[ToolSchema]) -> Result<ModelReply>;

    /// Model name, recorded in chat metadata and logs
    fn model_name(&self) -> &str;

    /// One-shot text completion with no tools and no history
    async fn complete(&self, prompt: &str) -> Result<String> {
        let conversation = Conversation::from_turns(vec![Turn::user(prompt)]);
        match self.send(&conversation, &[]).await? {
            ModelReply::FinalAnswer(text) => Ok(text),
            ModelReply::ToolCallBatch(calls) => Err(AgentError::ModelApi(format!(
                "expected text, model requested {} tool call(s)",
                calls.len()
            ))),
        }
    }
}

/// HTTP client for the Gemini API
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    /// Create a client for one model
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let model = model.into();
        if !is_valid_model(&model) {
            return Err(AgentError::ConfigError(format!(
                "Invalid model '{}'. Valid models: {}",
                model,
                VALID_MODELS.join(", ")
            )));
        }

        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::ConfigError(format!("{} is empty", API_KEY_ENV)));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            api_key,
        })
    }

    /// Create a client reading the key from `GOOGLE_API_KEY`
    pub fn from_env(model: impl Into<String>, base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            AgentError::ConfigError(format!(
                "{} environment variable not set. Export it and retry.",
                API_KEY_ENV
            ))
        })?;

        Self::new(api_key, model, base_url, timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn send(&self, conversation: &Conversation, tools: &[ToolSchema]) -> Result<ModelReply> {
        let request = build_request(conversation, tools);
        debug!(
            model = %self.model,
            contents = request.contents.len(),
            tools = tools.len(),
            "calling generateContent"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(model = %self.model, status = %status, "Gemini API error");
            return Err(status_error(status, &body));
        }

        let reply = parse_body(&body)?;

        match &reply {
            ModelReply::FinalAnswer(text) => {
                info!(model = %self.model, chars = text.len(), "model returned final answer")
            }
            ModelReply::ToolCallBatch(calls) => {
                info!(model = %self.model, calls = calls.len(), "model requested tool calls")
            }
        }

        Ok(reply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Map a non-2xx status to a run-level error
fn status_error(status: StatusCode, body: &str) -> AgentError {
    let detail: String = body.chars().take(500).collect();

    if status == StatusCode::TOO_MANY_REQUESTS {
        AgentError::RateLimited(detail)
    } else {
        AgentError::ModelApi(format!("HTTP {}: {}", status.as_u16(), detail))
    }
}

/// Build the request body from the conversation and tool schemas
pub fn build_request(conversation: &Conversation, tools: &[ToolSchema]) -> GenerateContentRequest {
    let declarations: Vec<FunctionDeclaration> = tools
        .iter()
        .map(|schema| {
            let mut parameters = schema.parameters.clone();
            strip_unsupported_fields(&mut parameters);
            FunctionDeclaration {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters,
            }
        })
        .collect();

    GenerateContentRequest {
        contents: build_contents(conversation),
        tools: if declarations.is_empty() {
            Vec::new()
        } else {
            vec![ToolDeclarations {
                function_declarations: declarations,
            }]
        },
        system_instruction: Some(Content {
            role: None,
            parts: vec![Part::text(SYSTEM_INSTRUCTION)],
        }),
    }
}

/// Convert turns to Gemini contents
///
/// Consecutive tool results are grouped into one `function` content so each
/// `functionCall` batch is answered by a single block of responses in order.
pub fn build_contents(conversation: &Conversation) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::with_capacity(conversation.len());

    for turn in conversation.turns() {
        match turn {
            Turn::User { text } => contents.push(Content::new("user", vec![Part::text(text)])),
            Turn::Model {
                reply: ModelReply::FinalAnswer(text),
            } => contents.push(Content::new("model", vec![Part::text(text)])),
            Turn::Model {
                reply: ModelReply::ToolCallBatch(calls),
            } => {
                let parts = calls
                    .iter()
                    .map(|call| {
                        let mut part = Part::function_call(&call.name, Value::Object(call.arguments.clone()));
                        part.thought_signature = call.thought_signature.clone();
                        part
                    })
                    .collect();
                contents.push(Content::new("model", parts));
            }
            Turn::Tool { result } => {
                let part = Part::function_response(&result.tool, result.response_payload());
                match contents.last_mut() {
                    Some(last) if last.role.as_deref() == Some("function") => last.parts.push(part),
                    _ => contents.push(Content::new("function", vec![part])),
                }
            }
        }
    }

    contents
}

/// Decode a 2xx response body and classify it
///
/// A body that does not decode is a failed model call, not a local
/// serialization fault.
pub fn parse_body(body: &str) -> Result<ModelReply> {
    let parsed: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
        let snippet: String = body.chars().take(200).collect();
        debug!(error = %e, body = %snippet, "undecodable Gemini response");
        AgentError::ModelApi(format!("invalid response: {}", e))
    })?;

    parse_reply(parsed)
}

/// Classify a response as a final answer or a tool-call batch
pub fn parse_reply(response: GenerateContentResponse) -> Result<ModelReply> {
    let block_reason = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.clone());

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(AgentError::ModelBlocked(
            block_reason
                .map(|reason| format!("prompt blocked ({})", reason))
                .unwrap_or_else(|| "no candidates returned".to_string()),
        ));
    };

    let finish_reason = candidate.finish_reason.unwrap_or_default();
    if BLOCKED_FINISH_REASONS.contains(&finish_reason.to_ascii_uppercase().as_str()) {
        return Err(AgentError::ModelBlocked(format!("finish reason: {}", finish_reason)));
    }

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let mut text = String::new();
    let mut calls = Vec::new();
    for part in parts {
        if let Some(call) = part.function_call {
            let mut request = ToolCallRequest::new(call.name.trim(), call.args);
            request.thought_signature = part.thought_signature;
            calls.push(request);
        } else if let Some(chunk) = part.text {
            if part.thought != Some(true) {
                text.push_str(&chunk);
            }
        }
    }

    if !calls.is_empty() {
        if !text.trim().is_empty() {
            debug!(chars = text.len(), "dropping text that accompanied tool calls");
        }
        return Ok(ModelReply::ToolCallBatch(calls));
    }

    if text.trim().is_empty() {
        return Err(AgentError::ModelApi(format!(
            "empty response (finishReason={})",
            if finish_reason.is_empty() { "unknown" } else { &finish_reason }
        )));
    }

    Ok(ModelReply::FinalAnswer(text))
}

/// Recursively strip fields Gemini rejects in function parameter schemas
fn strip_unsupported_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("$schema");
            map.remove("additionalProperties");
            for v in map.values_mut() {
                strip_unsupported_fields(v);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                strip_unsupported_fields(v);
            }
        }
        _ => {}
    }
}
