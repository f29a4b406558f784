// Chat persistence
//
// Components:
// - ChatStore: append/list interface the turn execution service consumes
// - ChatMeta: title and model of a chat
// - JsonlChatStore: one append-only JSON-lines file per chat plus a metadata sidecar
// - MemoryChatStore: in-process store for tests and throwaway runs

pub mod store;
pub mod persistence;
pub mod memory;

// Re-export key types
pub use store::{
    normalize_title, validate_chat_id, ChatMeta, ChatStore, ChatSummary, StoredTurn,
    DEFAULT_CHAT_TITLE, UNTITLED_CHAT_TITLE,
};
pub use persistence::JsonlChatStore;
pub use memory::MemoryChatStore;
