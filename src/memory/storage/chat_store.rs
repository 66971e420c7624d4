//! `SQLite`-backed store for conversations, messages and global facts.
//!
//! The table layout matches the one written by earlier releases of the
//! assistant, so an existing `chat_memory.db` opens without migration.

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio_rusqlite::Connection;

use crate::memory::core::config::StorageConfig;
use crate::memory::core::errors::{StorageError, StorageResult};
use crate::memory::core::ids::{ConversationId, MessageId};
use crate::memory::core::records::{Conversation, Fact, Message, MessageRole};

/// Boxed future type for chat store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable CRUD for conversations, messages and facts.
///
/// Every operation is applied atomically. Ordering and limits beyond plain
/// listing are left to callers.
pub trait ChatStore: Send + Sync {
    /// Insert a conversation stamped with the current time.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn create_conversation(&self, title: &str) -> StoreFuture<'_, StorageResult<Conversation>>;

    /// List all conversations, newest first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_conversations(&self) -> StoreFuture<'_, StorageResult<Vec<Conversation>>>;

    /// Check if a conversation exists.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn conversation_exists(&self, id: ConversationId) -> StoreFuture<'_, StorageResult<bool>>;

    /// Delete conversations and their messages, in the given order.
    /// Returns how many conversations were removed.
    ///
    /// # Errors
    /// Returns an error if storage access fails; nothing is deleted in that case.
    fn delete_conversations(
        &self,
        ids: Vec<ConversationId>,
    ) -> StoreFuture<'_, StorageResult<usize>>;

    /// Append a message to a conversation.
    ///
    /// # Errors
    /// Returns [`StorageError::ConversationNotFound`] if the conversation does
    /// not exist, or another error if storage access fails.
    fn append_message(
        &self,
        conversation_id: ConversationId,
        role: MessageRole,
        text: &str,
    ) -> StoreFuture<'_, StorageResult<Message>>;

    /// Load messages of a conversation oldest first, optionally keeping only
    /// the most recent `limit`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn load_messages(
        &self,
        conversation_id: ConversationId,
        limit: Option<usize>,
    ) -> StoreFuture<'_, StorageResult<Vec<Message>>>;

    /// Insert a fact or replace the value stored under its key.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn upsert_fact(&self, fact: &Fact) -> StoreFuture<'_, StorageResult<()>>;

    /// List all facts ordered by key.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_facts(&self) -> StoreFuture<'_, StorageResult<Vec<Fact>>>;

    /// Delete every message and conversation, keeping facts.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn delete_all_conversations(&self) -> StoreFuture<'_, StorageResult<()>>;

    /// Delete every message, conversation and fact.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn delete_everything(&self) -> StoreFuture<'_, StorageResult<()>>;
}

type ConversationRow = (ConversationId, Option<String>, Option<String>);
type MessageRow = (MessageId, ConversationId, String, Option<String>, Option<String>);

/// `SQLite` implementation of the chat store.
pub struct SqliteChatStore {
    conn: Connection,
}

impl SqliteChatStore {
    /// Open (or create) the database file named in the config.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        let conn = Connection::open(&config.sqlite_path).await?;
        Self::init(conn).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub async fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> StorageResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                CREATE TABLE IF NOT EXISTS conversations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                );
                CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    conversation_id INTEGER REFERENCES conversations(id),
                    role TEXT,
                    message TEXT,
                    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
                );
                CREATE INDEX IF NOT EXISTS idx_messages_conversation
                    ON messages (conversation_id, id);
                CREATE TABLE IF NOT EXISTS global_memory (
                    key TEXT PRIMARY KEY,
                    value TEXT
                );",
            )?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }
}

impl ChatStore for SqliteChatStore {
    fn create_conversation(&self, title: &str) -> StoreFuture<'_, StorageResult<Conversation>> {
        let title = title.to_string();
        Box::pin(async move {
            let row: ConversationRow = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    tx.execute(
                        "INSERT INTO conversations (title) VALUES (?1)",
                        rusqlite::params![title],
                    )?;
                    let id = tx.last_insert_rowid();
                    let row = tx.query_row(
                        "SELECT id, title, created_at FROM conversations WHERE id = ?1",
                        rusqlite::params![id],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )?;
                    tx.commit()?;
                    Ok(row)
                })
                .await?;
            conversation_from_row(row)
        })
    }

    fn list_conversations(&self) -> StoreFuture<'_, StorageResult<Vec<Conversation>>> {
        Box::pin(async move {
            let rows: Vec<ConversationRow> = self
                .conn
                .call(|conn| {
                    let mut stmt = conn.prepare(
                        "SELECT id, title, created_at
                         FROM conversations
                         ORDER BY created_at DESC, id DESC",
                    )?;
                    let rows = stmt
                        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(conversation_from_row).collect()
        })
    }

    fn conversation_exists(&self, id: ConversationId) -> StoreFuture<'_, StorageResult<bool>> {
        Box::pin(async move {
            let exists = self
                .conn
                .call(move |conn| {
                    let count: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM conversations WHERE id = ?1",
                        rusqlite::params![id],
                        |row| row.get(0),
                    )?;
                    Ok(count > 0)
                })
                .await?;
            Ok(exists)
        })
    }

    fn delete_conversations(
        &self,
        ids: Vec<ConversationId>,
    ) -> StoreFuture<'_, StorageResult<usize>> {
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(0);
            }

            let deleted = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let mut deleted = 0_usize;
                    {
                        let mut delete_messages =
                            tx.prepare("DELETE FROM messages WHERE conversation_id = ?1")?;
                        let mut delete_conversation =
                            tx.prepare("DELETE FROM conversations WHERE id = ?1")?;
                        for id in ids {
                            delete_messages.execute(rusqlite::params![id])?;
                            deleted += delete_conversation.execute(rusqlite::params![id])?;
                        }
                    }
                    tx.commit()?;
                    Ok(deleted)
                })
                .await?;
            Ok(deleted)
        })
    }

    fn append_message(
        &self,
        conversation_id: ConversationId,
        role: MessageRole,
        text: &str,
    ) -> StoreFuture<'_, StorageResult<Message>> {
        let text = text.to_string();
        Box::pin(async move {
            let row: Option<MessageRow> = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let count: i64 = tx.query_row(
                        "SELECT COUNT(*) FROM conversations WHERE id = ?1",
                        rusqlite::params![conversation_id],
                        |row| row.get(0),
                    )?;
                    if count == 0 {
                        return Ok(None);
                    }

                    tx.execute(
                        "INSERT INTO messages (conversation_id, role, message)
                         VALUES (?1, ?2, ?3)",
                        rusqlite::params![conversation_id, role.as_str(), text],
                    )?;
                    let id = tx.last_insert_rowid();
                    let row = tx.query_row(
                        "SELECT id, conversation_id, role, message, timestamp
                         FROM messages WHERE id = ?1",
                        rusqlite::params![id],
                        |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                            ))
                        },
                    )?;
                    tx.commit()?;
                    Ok(Some(row))
                })
                .await?;

            let row = row.ok_or(StorageError::ConversationNotFound(conversation_id))?;
            message_from_row(row)
        })
    }

    fn load_messages(
        &self,
        conversation_id: ConversationId,
        limit: Option<usize>,
    ) -> StoreFuture<'_, StorageResult<Vec<Message>>> {
        Box::pin(async move {
            // SQLite treats a negative LIMIT as "no limit".
            let limit = limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
            let rows: Vec<MessageRow> = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(
                        "SELECT id, conversation_id, role, message, timestamp FROM (
                            SELECT id, conversation_id, role, message, timestamp
                            FROM messages
                            WHERE conversation_id = ?1
                            ORDER BY id DESC
                            LIMIT ?2
                         )
                         ORDER BY id ASC",
                    )?;
                    let rows = stmt
                        .query_map(rusqlite::params![conversation_id, limit], |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                            ))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(message_from_row).collect()
        })
    }

    fn upsert_fact(&self, fact: &Fact) -> StoreFuture<'_, StorageResult<()>> {
        let fact = fact.clone();
        Box::pin(async move {
            self.conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO global_memory (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                        rusqlite::params![fact.key, fact.value],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn list_facts(&self) -> StoreFuture<'_, StorageResult<Vec<Fact>>> {
        Box::pin(async move {
            let facts = self
                .conn
                .call(|conn| {
                    let mut stmt =
                        conn.prepare("SELECT key, value FROM global_memory ORDER BY key")?;
                    let rows = stmt
                        .query_map([], |row| {
                            let key: String = row.get(0)?;
                            let value: Option<String> = row.get(1)?;
                            Ok(Fact {
                                key,
                                value: value.unwrap_or_default(),
                            })
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;
            Ok(facts)
        })
    }

    fn delete_all_conversations(&self) -> StoreFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.conn
                .call(|conn| {
                    let tx = conn.transaction()?;
                    tx.execute("DELETE FROM messages", [])?;
                    tx.execute("DELETE FROM conversations", [])?;
                    tx.commit()?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn delete_everything(&self) -> StoreFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.conn
                .call(|conn| {
                    let tx = conn.transaction()?;
                    tx.execute("DELETE FROM messages", [])?;
                    tx.execute("DELETE FROM conversations", [])?;
                    tx.execute("DELETE FROM global_memory", [])?;
                    tx.commit()?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }
}

fn conversation_from_row(row: ConversationRow) -> StorageResult<Conversation> {
    let (id, title, created_at) = row;
    Ok(Conversation {
        id,
        title: title.unwrap_or_default(),
        created_at: parse_timestamp(created_at.as_deref())?,
    })
}

fn message_from_row(row: MessageRow) -> StorageResult<Message> {
    let (id, conversation_id, role, text, timestamp) = row;
    let role = MessageRole::from_str(&role)
        .map_err(|err| StorageError::InvalidRecord(format!("invalid role: {err}")))?;
    Ok(Message {
        id,
        conversation_id,
        role,
        text: text.unwrap_or_default(),
        timestamp: parse_timestamp(timestamp.as_deref())?,
    })
}

/// Parse a `CURRENT_TIMESTAMP` value (`YYYY-MM-DD HH:MM:SS`, UTC).
fn parse_timestamp(raw: Option<&str>) -> StorageResult<DateTime<Utc>> {
    let raw = raw.ok_or_else(|| StorageError::InvalidRecord("missing timestamp".to_string()))?;
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| StorageError::InvalidRecord(format!("invalid timestamp {raw:?}: {err}")))
}
