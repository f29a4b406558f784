//! Chat store interface
//!
//! Persisted turns are the durable source of truth for a chat; the turn
//! loop re-reads them at the start of every run.

use crate::errors::{AgentError, Result};
use crate::types::{Conversation, Turn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted chat id
pub const MAX_CHAT_ID_LEN: usize = 128;

/// Title of a chat that has not been named yet
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// Title used when a rename asks for an empty one
pub const UNTITLED_CHAT_TITLE: &str = "Untitled Chat";

/// Longest stored title, in characters
pub const MAX_TITLE_CHARS: usize = 100;

/// One persisted turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTurn {
    /// Position within the chat, starting at 0
    pub seq: u64,

    /// When the turn was appended
    pub created_at: DateTime<Utc>,

    pub turn: Turn,
}

/// Per-chat metadata kept beside the turns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMeta {
    pub title: String,

    /// Model the chat runs on unless overridden
    pub model: String,

    pub created_at: DateTime<Utc>,
}

impl ChatMeta {
    /// Metadata for a chat started on `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            title: DEFAULT_CHAT_TITLE.to_string(),
            model: model.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether the chat still carries the placeholder title
    pub fn is_untitled(&self) -> bool {
        self.title == DEFAULT_CHAT_TITLE
    }

    /// Header printed above an exported transcript
    pub fn header(&self) -> String {
        format!("Chat History: {}\nModel: {}\n", self.title, self.model)
    }
}

/// Clean a user- or model-supplied title
///
/// Line breaks become spaces, surrounding quotes and markdown markers are
/// dropped, and the result is capped at [`MAX_TITLE_CHARS`]. An empty result
/// becomes [`UNTITLED_CHAT_TITLE`].
pub fn normalize_title(raw: &str) -> String {
    let flat = raw.replace(['\r', '\n'], " ");
    let cleaned = flat
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '_' | '#' | '~' | '`'))
        .trim();

    if cleaned.is_empty() {
        return UNTITLED_CHAT_TITLE.to_string();
    }

    cleaned.chars().take(MAX_TITLE_CHARS).collect::<String>().trim_end().to_string()
}

/// Listing entry for one chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: String,
    pub turn_count: usize,
    pub updated_at: Option<DateTime<Utc>>,

    /// Title and model, when the chat has metadata
    pub meta: Option<ChatMeta>,
}

/// Append-only per-chat turn storage
///
/// Implementations serialize appends per chat.
pub trait ChatStore: Send + Sync {
    /// Append turns at the end of the chat as one unit
    ///
    /// Either every turn is stored, with consecutive `seq` values, or none
    /// is. A failed call leaves the chat exactly as it was.
    fn append_all(&self, chat_id: &str, turns: &[Turn]) -> Result<Vec<StoredTurn>>;

    /// All stored turns ordered by `seq`; empty for an unknown chat
    fn records(&self, chat_id: &str) -> Result<Vec<StoredTurn>>;

    /// All chats with at least one turn, most recently updated first
    fn list_chats(&self) -> Result<Vec<ChatSummary>>;

    /// Remove a chat and its metadata; returns whether it existed
    fn delete(&self, chat_id: &str) -> Result<bool>;

    /// Metadata of a chat, if any was saved
    fn meta(&self, chat_id: &str) -> Result<Option<ChatMeta>>;

    /// Create or replace the metadata of a chat
    fn save_meta(&self, chat_id: &str, meta: &ChatMeta) -> Result<()>;

    /// Append a single turn
    fn append(&self, chat_id: &str, turn: &Turn) -> Result<StoredTurn> {
        self.append_all(chat_id, std::slice::from_ref(turn))?
            .pop()
            .ok_or_else(|| AgentError::StoreError(format!("Append to chat {} stored nothing", chat_id)))
    }

    /// Set a chat's title; returns false when the chat has no metadata
    fn rename(&self, chat_id: &str, title: &str) -> Result<bool> {
        let Some(mut meta) = self.meta(chat_id)? else {
            return Ok(false);
        };

        meta.title = normalize_title(title);
        self.save_meta(chat_id, &meta)?;
        Ok(true)
    }

    /// Turns of a chat in order
    fn list(&self, chat_id: &str) -> Result<Vec<Turn>> {
        Ok(self.records(chat_id)?.into_iter().map(|r| r.turn).collect())
    }

    /// Turns of a chat as a conversation
    fn load_conversation(&self, chat_id: &str) -> Result<Conversation> {
        Ok(Conversation::from_turns(self.list(chat_id)?))
    }
}

/// Validate a chat id: 1-128 chars of ASCII alphanumerics, `-`, `_`
pub fn validate_chat_id(chat_id: &str) -> Result<()> {
    let valid = !chat_id.is_empty()
        && chat_id.len() <= MAX_CHAT_ID_LEN
        && chat_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(AgentError::StoreError(format!(
            "Invalid chat id '{}': use 1-{} letters, digits, '-' or '_'",
            chat_id, MAX_CHAT_ID_LEN
        )))
    }
}

/// Sort summaries newest first, ties broken by id
pub(crate) fn sort_summaries(summaries: &mut [ChatSummary]) {
    summaries.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.chat_id.cmp(&b.chat_id))
    });
}
