//! Chat persistence on disk
//!
//! One append-only `chat_<id>.jsonl` file per chat; each line is a
//! [`StoredTurn`]. Title and model live in a `chat_<id>.meta.json` sidecar.

use crate::errors::{AgentError, Result};
use crate::session::store::{
    sort_summaries, validate_chat_id, ChatMeta, ChatStore, ChatSummary, StoredTurn,
};
use crate::types::Turn;
use chrono::Utc;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const FILE_PREFIX: &str = "chat_";
const FILE_SUFFIX: &str = ".jsonl";
const META_SUFFIX: &str = ".meta.json";

/// JSON-lines chat store
#[derive(Debug)]
pub struct JsonlChatStore {
    /// Directory holding the chat files
    dir: PathBuf,

    /// Next sequence number per chat; the lock also serializes appends
    next_seq: Mutex<HashMap<String, u64>>,
}

impl JsonlChatStore {
    /// Open a store, creating the directory if it doesn't exist
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                AgentError::StoreError(format!(
                    "Failed to create chat directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(Self {
            dir,
            next_seq: Mutex::new(HashMap::new()),
        })
    }

    /// Get storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chat_path(&self, chat_id: &str) -> PathBuf {
        self.dir.join(format!("{}{}{}", FILE_PREFIX, chat_id, FILE_SUFFIX))
    }

    fn meta_path(&self, chat_id: &str) -> PathBuf {
        self.dir.join(format!("{}{}{}", FILE_PREFIX, chat_id, META_SUFFIX))
    }

    fn read_meta(&self, chat_id: &str) -> Result<Option<ChatMeta>> {
        let path = self.meta_path(chat_id);
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path).map_err(|e| {
            AgentError::StoreError(format!("Failed to read metadata of chat {}: {}", chat_id, e))
        })?;
        let meta = serde_json::from_str(&raw).map_err(|e| {
            AgentError::StoreError(format!("Corrupt metadata for chat {}: {}", chat_id, e))
        })?;

        Ok(Some(meta))
    }

    fn read_records(&self, chat_id: &str) -> Result<Vec<StoredTurn>> {
        let path = self.chat_path(chat_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&path).map_err(|e| {
            AgentError::StoreError(format!("Failed to open chat {}: {}", chat_id, e))
        })?;

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                AgentError::StoreError(format!("Failed to read chat {}: {}", chat_id, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let record: StoredTurn = serde_json::from_str(&line).map_err(|e| {
                AgentError::StoreError(format!(
                    "Corrupt record in chat {} at line {}: {}",
                    chat_id,
                    index + 1,
                    e
                ))
            })?;
            records.push(record);
        }

        records.sort_by_key(|r| r.seq);
        Ok(records)
    }
}

impl ChatStore for JsonlChatStore {
    fn append_all(&self, chat_id: &str, turns: &[Turn]) -> Result<Vec<StoredTurn>> {
        validate_chat_id(chat_id)?;

        let mut next_seq = self
            .next_seq
            .lock()
            .map_err(|_| AgentError::StoreError("chat store lock poisoned".to_string()))?;

        let first_seq = match next_seq.get(chat_id) {
            Some(seq) => *seq,
            None => self
                .read_records(chat_id)?
                .last()
                .map(|r| r.seq + 1)
                .unwrap_or(0),
        };

        let now = Utc::now();
        let records: Vec<StoredTurn> = turns
            .iter()
            .enumerate()
            .map(|(offset, turn)| StoredTurn {
                seq: first_seq + offset as u64,
                created_at: now,
                turn: turn.clone(),
            })
            .collect();
        if records.is_empty() {
            return Ok(records);
        }

        let mut buffer = String::new();
        for record in &records {
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
        }

        let path = self.chat_path(chat_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AgentError::StoreError(format!("Failed to open chat {}: {}", chat_id, e)))?;
        let original_len = file
            .metadata()
            .map_err(|e| AgentError::StoreError(format!("Failed to stat chat {}: {}", chat_id, e)))?
            .len();

        if let Err(e) = file.write_all(buffer.as_bytes()).and_then(|_| file.flush()) {
            // Cut back to the last complete batch so no partial round survives
            if let Err(truncate_err) = file.set_len(original_len) {
                warn!(chat_id, error = %truncate_err, "failed to roll back partial write");
            }
            return Err(AgentError::StoreError(format!("Failed to write chat {}: {}", chat_id, e)));
        }

        let next = first_seq + records.len() as u64;
        next_seq.insert(chat_id.to_string(), next);
        debug!(chat_id, first_seq, count = records.len(), "turns persisted");

        Ok(records)
    }

    fn records(&self, chat_id: &str) -> Result<Vec<StoredTurn>> {
        validate_chat_id(chat_id)?;
        self.read_records(chat_id)
    }

    fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            AgentError::StoreError(format!("Failed to list {}: {}", self.dir.display(), e))
        })?;

        let mut summaries = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let Some(chat_id) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(FILE_PREFIX))
                .and_then(|n| n.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            if validate_chat_id(chat_id).is_err() {
                continue;
            }

            let records = self.read_records(chat_id)?;
            if let Some(last) = records.last() {
                summaries.push(ChatSummary {
                    chat_id: chat_id.to_string(),
                    turn_count: records.len(),
                    updated_at: Some(last.created_at),
                    meta: self.read_meta(chat_id)?,
                });
            }
        }

        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    fn delete(&self, chat_id: &str) -> Result<bool> {
        validate_chat_id(chat_id)?;

        let mut next_seq = self
            .next_seq
            .lock()
            .map_err(|_| AgentError::StoreError("chat store lock poisoned".to_string()))?;
        next_seq.remove(chat_id);

        let mut existed = false;
        for path in [self.chat_path(chat_id), self.meta_path(chat_id)] {
            if !path.exists() {
                continue;
            }
            fs::remove_file(&path)
                .map_err(|e| AgentError::StoreError(format!("Failed to delete chat {}: {}", chat_id, e)))?;
            existed = true;
        }

        if existed {
            debug!(chat_id, "chat deleted");
        }
        Ok(existed)
    }

    fn meta(&self, chat_id: &str) -> Result<Option<ChatMeta>> {
        validate_chat_id(chat_id)?;
        self.read_meta(chat_id)
    }

    fn save_meta(&self, chat_id: &str, meta: &ChatMeta) -> Result<()> {
        validate_chat_id(chat_id)?;

        let path = self.meta_path(chat_id);
        let staging = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(meta)?;

        fs::write(&staging, body)
            .and_then(|_| fs::rename(&staging, &path))
            .map_err(|e| {
                AgentError::StoreError(format!("Failed to save metadata of chat {}: {}", chat_id, e))
            })?;
        debug!(chat_id, title = %meta.title, model = %meta.model, "chat metadata saved");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolCallRequest, ToolError, ToolResult};
    use crate::types::ModelReply;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup_store() -> (JsonlChatStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = JsonlChatStore::new(temp.path().join("chats")).unwrap();
        (store, temp)
    }

    #[test]
    fn test_creates_directory() {
        let (store, _temp) = setup_store();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn test_append_and_reload_all_turn_kinds() {
        let (store, temp) = setup_store();
        let turns = vec![
            Turn::user("read a.txt"),
            Turn::model(ModelReply::ToolCallBatch(vec![ToolCallRequest::new(
                "read_file",
                json!({"path": "a.txt"}),
            )
            .with_id("call-1-0")])),
            Turn::tool(ToolResult::failure(
                "call-1-0".to_string(),
                "read_file".to_string(),
                ToolError::PathEscape {
                    path: "../a.txt".to_string(),
                },
                Duration::from_millis(2),
            )),
            Turn::model(ModelReply::FinalAnswer("It is outside the sandbox.".to_string())),
        ];

        for turn in &turns {
            store.append("chat-1", turn).unwrap();
        }

        // A fresh store sees the same history
        let reopened = JsonlChatStore::new(temp.path().join("chats")).unwrap();
        assert_eq!(reopened.list("chat-1").unwrap(), turns);

        let seqs: Vec<u64> = reopened.records("chat-1").unwrap().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_seq_continues_after_reopen() {
        let (store, temp) = setup_store();
        store.append("c", &Turn::user("one")).unwrap();
        drop(store);

        let reopened = JsonlChatStore::new(temp.path().join("chats")).unwrap();
        let record = reopened.append("c", &Turn::user("two")).unwrap();
        assert_eq!(record.seq, 1);
    }

    #[test]
    fn test_unknown_chat_is_empty() {
        let (store, _temp) = setup_store();
        assert!(store.list("never-used").unwrap().is_empty());
    }

    #[test]
    fn test_list_chats_and_delete() {
        let (store, _temp) = setup_store();
        store.append("a", &Turn::user("x")).unwrap();
        store.append("b", &Turn::user("y")).unwrap();
        store.append("b", &Turn::user("z")).unwrap();
        fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

        let chats = store.list_chats().unwrap();
        assert_eq!(chats.len(), 2);
        let b = chats.iter().find(|c| c.chat_id == "b").unwrap();
        assert_eq!(b.turn_count, 2);

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.list_chats().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_line_reported() {
        let (store, _temp) = setup_store();
        store.append("c", &Turn::user("fine")).unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(store.dir().join("chat_c.jsonl"))
            .unwrap();
        writeln!(file, "{{not json").unwrap();

        let err = store.list("c").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_append_all_writes_one_batch() {
        let (store, temp) = setup_store();
        store.append("c", &Turn::user("first")).unwrap();

        let batch = vec![
            Turn::model(ModelReply::ToolCallBatch(vec![ToolCallRequest::new(
                "list_directory",
                json!({"path": "."}),
            )
            .with_id("call-1-0")])),
            Turn::tool(ToolResult::success(
                "call-1-0".to_string(),
                "list_directory".to_string(),
                crate::tools::ToolOutput::new("a.txt"),
                Duration::from_millis(1),
            )),
        ];
        let stored = store.append_all("c", &batch).unwrap();
        assert_eq!(stored.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert!(store.append_all("c", &[]).unwrap().is_empty());

        let reopened = JsonlChatStore::new(temp.path().join("chats")).unwrap();
        assert!(reopened.load_conversation("c").unwrap().is_well_formed());
        assert_eq!(reopened.list("c").unwrap().len(), 3);
    }

    #[test]
    fn test_meta_sidecar_round_trip() {
        let (store, temp) = setup_store();
        assert!(store.meta("c").unwrap().is_none());

        store.save_meta("c", &ChatMeta::new("gemini-2.5-flash-lite")).unwrap();
        store.append("c", &Turn::user("hello")).unwrap();
        assert!(store.rename("c", "Greeting Test").unwrap());
        assert!(store.dir().join("chat_c.meta.json").is_file());

        let reopened = JsonlChatStore::new(temp.path().join("chats")).unwrap();
        let meta = reopened.meta("c").unwrap().unwrap();
        assert_eq!(meta.title, "Greeting Test");
        assert_eq!(meta.model, "gemini-2.5-flash-lite");

        // The sidecar is not mistaken for a chat file
        let chats = reopened.list_chats().unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].meta.as_ref().unwrap().title, "Greeting Test");

        assert!(reopened.delete("c").unwrap());
        assert!(!store.dir().join("chat_c.meta.json").exists());
    }

    #[test]
    fn test_chat_id_cannot_escape_directory() {
        let (store, _temp) = setup_store();
        assert!(store.append("../../evil", &Turn::user("x")).is_err());
        assert!(store.delete("../chats").is_err());
    }
}
