//! Persistent storage for conversations, messages and facts.

pub mod chat_store;

pub use chat_store::{ChatStore, SqliteChatStore, StoreFuture};
