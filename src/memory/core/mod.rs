//! Core memory types, identifiers and configuration.

pub mod config;
pub mod errors;
pub mod ids;
pub mod records;

pub use config::{
    AssistantConfig, HistoryConfig, LlmConfig, RetentionConfig, SamplingConfig, ServerConfig,
    StorageConfig, TitleConfig,
};
pub use errors::{MemoryError, MemoryResult, StorageError, StorageResult};
pub use ids::{ConversationId, MessageId};
pub use records::{Conversation, Fact, Message, MessageRole};
