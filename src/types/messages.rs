//! Conversation types
//!
//! Defines the turns exchanged between the user, the model, and the tool
//! layer, and the ordered conversation that carries them.

use crate::tools::{ToolCallRequest, ToolOutcome, ToolResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A model reply: either a final answer or an ordered batch of tool calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ModelReply {
    FinalAnswer(String),
    ToolCallBatch(Vec<ToolCallRequest>),
}

/// One unit of conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    /// User's message
    User { text: String },

    /// Model's reply
    Model { reply: ModelReply },

    /// Result of one requested tool call
    Tool { result: ToolResult },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::User { text: text.into() }
    }

    pub fn model(reply: ModelReply) -> Self {
        Turn::Model { reply }
    }

    pub fn tool(result: ToolResult) -> Self {
        Turn::Tool { result }
    }
}

/// Ordered sequence of turns
///
/// Invariant (checked by [`Conversation::is_well_formed`]): every tool-call
/// batch is immediately followed by exactly one result per request, in the
/// order the requests were emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns appended at or after `index`
    pub fn turns_since(&self, index: usize) -> &[Turn] {
        self.turns.get(index..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// All tool results, in conversation order
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.turns.iter().filter_map(|turn| match turn {
            Turn::Tool { result } => Some(result),
            _ => None,
        })
    }

    /// Check the call/result pairing invariant
    pub fn is_well_formed(&self) -> bool {
        let mut index = 0;

        while index < self.turns.len() {
            match &self.turns[index] {
                Turn::Model {
                    reply: ModelReply::ToolCallBatch(calls),
                } => {
                    for (offset, call) in calls.iter().enumerate() {
                        match self.turns.get(index + 1 + offset) {
                            Some(Turn::Tool { result }) if result.call_id == call.id => {}
                            _ => return false,
                        }
                    }
                    index += calls.len() + 1;
                }
                Turn::Tool { .. } => return false,
                _ => index += 1,
            }
        }

        true
    }

    /// Plain-text transcript with role headers
    pub fn render_transcript(&self) -> String {
        let mut out = String::new();

        for turn in &self.turns {
            // Writing to a String cannot fail
            let _ = match turn {
                Turn::User { text } => writeln!(out, "--- You ---\n{}\n", text),
                Turn::Model {
                    reply: ModelReply::FinalAnswer(text),
                } => writeln!(out, "--- Model ---\n{}\n", text),
                Turn::Model {
                    reply: ModelReply::ToolCallBatch(calls),
                } => {
                    let lines: Vec<String> = calls
                        .iter()
                        .map(|c| format!("{} {}", c.name, serde_json::Value::Object(c.arguments.clone())))
                        .collect();
                    writeln!(out, "--- Model (tool calls) ---\n{}\n", lines.join("\n"))
                }
                Turn::Tool { result } => match &result.outcome {
                    ToolOutcome::Success { output } => writeln!(
                        out,
                        "--- Tool {} [ok] ---\n{}\n",
                        result.tool, output.content
                    ),
                    ToolOutcome::Failure { error } => writeln!(
                        out,
                        "--- Tool {} [{}] ---\n{}\n",
                        result.tool,
                        error.kind(),
                        error
                    ),
                },
            };
        }

        out
    }
}
