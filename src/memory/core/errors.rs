//! Error types for the memory subsystem.

use thiserror::Error;

use crate::memory::core::ids::ConversationId;

/// Persistence failure raised by the chat store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// A message was appended to a conversation that does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),
    /// A stored row could not be decoded.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Convenience result alias for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Memory subsystem error type, used while wiring the subsystem together.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// HTTP client error.
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
