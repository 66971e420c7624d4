//! Conversational memory for the assistant.
//!
//! Organized into:
//! - `core`: Configuration, errors, identifiers and stored records
//! - `storage`: `SQLite` persistence of conversations, messages and facts
//! - `conversations`: Session pointers and the retention policy
//! - `ingest`: Fact extraction from user input
//! - `prompt`: Prompt assembly from facts and recent history
//! - `engine`: Per-turn orchestration

pub mod conversations;
pub mod core;
pub mod engine;
pub mod ingest;
pub mod prompt;
pub mod storage;

// Re-export commonly used types for convenience
pub use conversations::{ChatSession, ConversationManager};
pub use core::{
    AssistantConfig, Conversation, ConversationId, Fact, MemoryError, MemoryResult, Message,
    MessageId, MessageRole, SamplingConfig, StorageError, StorageResult,
};
pub use engine::ChatOrchestrator;
pub use ingest::{FactExtractor, parse_fact_reply};
pub use prompt::PromptAssembler;
pub use storage::{ChatStore, SqliteChatStore, StoreFuture};
