//! In-process chat store for tests and throwaway runs

use crate::errors::{AgentError, Result};
use crate::session::store::{sort_summaries, validate_chat_id, ChatMeta, ChatStore, ChatSummary, StoredTurn};
use crate::types::Turn;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryChat {
    turns: Vec<StoredTurn>,
    meta: Option<ChatMeta>,
}

/// Chat store kept in memory
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    chats: RwLock<HashMap<String, MemoryChat>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> AgentError {
    AgentError::StoreError("chat store lock poisoned".to_string())
}

impl ChatStore for MemoryChatStore {
    fn append_all(&self, chat_id: &str, turns: &[Turn]) -> Result<Vec<StoredTurn>> {
        validate_chat_id(chat_id)?;

        let mut chats = self.chats.write().map_err(|_| poisoned())?;
        let chat = chats.entry(chat_id.to_string()).or_default();
        let now = Utc::now();
        let first_seq = chat.turns.len() as u64;

        let stored: Vec<StoredTurn> = turns
            .iter()
            .enumerate()
            .map(|(offset, turn)| StoredTurn {
                seq: first_seq + offset as u64,
                created_at: now,
                turn: turn.clone(),
            })
            .collect();
        chat.turns.extend(stored.iter().cloned());

        Ok(stored)
    }

    fn records(&self, chat_id: &str) -> Result<Vec<StoredTurn>> {
        validate_chat_id(chat_id)?;

        let chats = self.chats.read().map_err(|_| poisoned())?;
        Ok(chats.get(chat_id).map(|c| c.turns.clone()).unwrap_or_default())
    }

    fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        let chats = self.chats.read().map_err(|_| poisoned())?;

        let mut summaries: Vec<ChatSummary> = chats
            .iter()
            .filter(|(_, chat)| !chat.turns.is_empty())
            .map(|(id, chat)| ChatSummary {
                chat_id: id.clone(),
                turn_count: chat.turns.len(),
                updated_at: chat.turns.last().map(|t| t.created_at),
                meta: chat.meta.clone(),
            })
            .collect();
        sort_summaries(&mut summaries);

        Ok(summaries)
    }

    fn delete(&self, chat_id: &str) -> Result<bool> {
        validate_chat_id(chat_id)?;

        let mut chats = self.chats.write().map_err(|_| poisoned())?;
        Ok(chats.remove(chat_id).is_some())
    }

    fn meta(&self, chat_id: &str) -> Result<Option<ChatMeta>> {
        validate_chat_id(chat_id)?;

        let chats = self.chats.read().map_err(|_| poisoned())?;
        Ok(chats.get(chat_id).and_then(|c| c.meta.clone()))
    }

    fn save_meta(&self, chat_id: &str, meta: &ChatMeta) -> Result<()> {
        validate_chat_id(chat_id)?;

        let mut chats = self.chats.write().map_err(|_| poisoned())?;
        chats.entry(chat_id.to_string()).or_default().meta = Some(meta.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::UNTITLED_CHAT_TITLE;

    #[test]
    fn test_append_and_list() {
        let store = MemoryChatStore::new();

        let first = store.append("c1", &Turn::user("one")).unwrap();
        let second = store.append("c1", &Turn::user("two")).unwrap();

        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert_eq!(store.list("c1").unwrap(), vec![Turn::user("one"), Turn::user("two")]);
        assert!(store.list("unknown").unwrap().is_empty());
    }

    #[test]
    fn test_append_all_continues_seq() {
        let store = MemoryChatStore::new();
        store.append("c1", &Turn::user("one")).unwrap();

        let stored = store
            .append_all("c1", &[Turn::user("two"), Turn::user("three")])
            .unwrap();
        let seqs: Vec<u64> = stored.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(store.list("c1").unwrap().len(), 3);
    }

    #[test]
    fn test_delete() {
        let store = MemoryChatStore::new();
        store.append("c1", &Turn::user("one")).unwrap();
        store.save_meta("c1", &ChatMeta::new("gemini-2.5-flash")).unwrap();

        assert!(store.delete("c1").unwrap());
        assert!(!store.delete("c1").unwrap());
        assert!(store.list_chats().unwrap().is_empty());
        assert!(store.meta("c1").unwrap().is_none());
    }

    #[test]
    fn test_meta_and_rename() {
        let store = MemoryChatStore::new();
        assert!(!store.rename("c1", "Anything").unwrap());

        store.save_meta("c1", &ChatMeta::new("gemini-2.5-pro")).unwrap();
        store.append("c1", &Turn::user("hi")).unwrap();
        assert!(store.rename("c1", "  Weekly Plan ").unwrap());

        let meta = store.meta("c1").unwrap().unwrap();
        assert_eq!(meta.title, "Weekly Plan");
        assert_eq!(meta.model, "gemini-2.5-pro");

        store.rename("c1", "").unwrap();
        let summary = &store.list_chats().unwrap()[0];
        assert_eq!(summary.meta.as_ref().unwrap().title, UNTITLED_CHAT_TITLE);
    }

    #[test]
    fn test_rejects_bad_chat_id() {
        let store = MemoryChatStore::new();
        assert!(store.append("../x", &Turn::user("one")).is_err());
        assert!(store.save_meta("../x", &ChatMeta::new("gemini-2.5-flash")).is_err());
    }
}
