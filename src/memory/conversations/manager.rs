//! Conversation lifecycle and bounded retention.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::memory::conversations::session::ChatSession;
use crate::memory::core::config::RetentionConfig;
use crate::memory::core::errors::StorageResult;
use crate::memory::core::ids::ConversationId;
use crate::memory::core::records::{Conversation, Fact, Message};
use crate::memory::storage::chat_store::ChatStore;

/// Owns the retention policy and the rules for moving a session's active pointer.
pub struct ConversationManager {
    store: Arc<dyn ChatStore>,
    max_conversations: usize,
    // Serializes creation with its retention pass, and bulk deletes.
    write_lock: Mutex<()>,
}

impl ConversationManager {
    /// Create a manager over a store.
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>, retention: &RetentionConfig) -> Self {
        Self {
            store,
            max_conversations: retention.max_conversations,
            write_lock: Mutex::new(()),
        }
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Maximum number of conversations kept after a creation.
    #[must_use]
    pub const fn max_conversations(&self) -> usize {
        self.max_conversations
    }

    /// Insert a conversation, then evict the oldest ones beyond the cap.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn create_conversation(&self, title: &str) -> StorageResult<ConversationId> {
        let _guard = self.write_lock.lock().await;

        let conversation = self.store.create_conversation(title).await?;
        info!("Created conversation {} ({:?})", conversation.id, conversation.title);

        let evicted = self.enforce_retention().await?;
        if !evicted.is_empty() {
            info!("Evicted {} conversation(s): {:?}", evicted.len(), evicted);
        }

        Ok(conversation.id)
    }

    /// Delete every conversation beyond the newest `max_conversations`,
    /// oldest first. Caller holds the write lock.
    async fn enforce_retention(&self) -> StorageResult<Vec<ConversationId>> {
        let conversations = self.store.list_conversations().await?;
        if conversations.len() <= self.max_conversations {
            return Ok(Vec::new());
        }

        let excess: Vec<ConversationId> = conversations[self.max_conversations..]
            .iter()
            .rev()
            .map(|conversation| conversation.id)
            .collect();
        self.store.delete_conversations(excess.clone()).await?;
        Ok(excess)
    }

    /// List conversations, newest first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn list_conversations(&self) -> StorageResult<Vec<Conversation>> {
        self.store.list_conversations().await
    }

    /// Check if a conversation exists.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn conversation_exists(&self, id: ConversationId) -> StorageResult<bool> {
        self.store.conversation_exists(id).await
    }

    /// Point the session at a conversation. The id is not checked against the store.
    pub fn set_active(&self, session: &mut ChatSession, id: ConversationId) {
        debug!("Session switched to conversation {id}");
        session.set_active(id);
    }

    /// Active conversation of the session.
    #[must_use]
    pub const fn active(&self, session: &ChatSession) -> Option<ConversationId> {
        session.active()
    }

    /// Active conversation of the session, checked against the store.
    ///
    /// A pointer to a conversation that no longer exists, for instance one
    /// evicted by another session, is cleared and `None` is returned.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn resolve_active(
        &self,
        session: &mut ChatSession,
    ) -> StorageResult<Option<ConversationId>> {
        let Some(id) = session.active() else {
            return Ok(None);
        };
        if self.store.conversation_exists(id).await? {
            return Ok(Some(id));
        }
        info!("Active conversation {id} no longer exists; detaching session");
        session.clear();
        Ok(None)
    }

    /// Detach the session from its conversation.
    pub fn clear_active(&self, session: &mut ChatSession) {
        session.clear();
    }

    /// Messages of a conversation oldest first, optionally only the last `limit`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn messages(
        &self,
        id: ConversationId,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Message>> {
        self.store.load_messages(id, limit).await
    }

    /// All stored facts.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn facts(&self) -> StorageResult<Vec<Fact>> {
        self.store.list_facts().await
    }

    /// Delete all conversations and messages; facts are kept.
    ///
    /// # Errors
    /// Returns an error if storage access fails; the session is left untouched then.
    pub async fn delete_all_conversations(&self, session: &mut ChatSession) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete_all_conversations().await?;
        session.clear();
        info!("Deleted all conversations");
        Ok(())
    }

    /// Delete all conversations, messages and facts.
    ///
    /// # Errors
    /// Returns an error if storage access fails; the session is left untouched then.
    pub async fn hard_reset(&self, session: &mut ChatSession) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete_everything().await?;
        session.clear();
        info!("Hard reset: conversations, messages and facts cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::core::records::MessageRole;
    use crate::memory::storage::chat_store::SqliteChatStore;

    async fn manager(max_conversations: usize) -> ConversationManager {
        let store = SqliteChatStore::open_in_memory().await.unwrap();
        ConversationManager::new(Arc::new(store), &RetentionConfig { max_conversations })
    }

    #[tokio::test]
    async fn test_retention_keeps_most_recent() {
        let manager = manager(3).await;
        let mut created = Vec::new();

        for i in 0..7 {
            created.push(manager.create_conversation(&format!("chat {i}")).await.unwrap());

            let listed: Vec<_> = manager
                .list_conversations()
                .await
                .unwrap()
                .into_iter()
                .map(|c| c.id)
                .collect();
            let expected: Vec<_> = created.iter().rev().take(3).copied().collect();
            assert_eq!(listed.len(), created.len().min(3));
            assert_eq!(listed, expected);
        }
    }

    #[tokio::test]
    async fn test_single_slot_evicts_previous_conversation() {
        let manager = manager(1).await;
        let a = manager.create_conversation("A").await.unwrap();
        manager
            .store()
            .append_message(a, MessageRole::User, "from A")
            .await
            .unwrap();

        let b = manager.create_conversation("B").await.unwrap();

        let listed = manager.list_conversations().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, b);
        assert!(!manager.conversation_exists(a).await.unwrap());
        assert!(manager.messages(a, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_active_does_not_validate() {
        let manager = manager(5).await;
        let mut session = ChatSession::new();
        assert_eq!(manager.active(&session), None);

        manager.set_active(&mut session, ConversationId::new(404));
        assert_eq!(manager.active(&session), Some(ConversationId::new(404)));

        manager.clear_active(&mut session);
        assert_eq!(manager.active(&session), None);
    }

    #[tokio::test]
    async fn test_resolve_active_detaches_evicted_conversation() {
        let manager = manager(1).await;
        let mut first = ChatSession::new();
        let a = manager.create_conversation("A").await.unwrap();
        manager.set_active(&mut first, a);
        assert_eq!(manager.resolve_active(&mut first).await.unwrap(), Some(a));

        manager.create_conversation("B").await.unwrap();

        assert_eq!(manager.resolve_active(&mut first).await.unwrap(), None);
        assert_eq!(manager.active(&first), None);
        assert_eq!(
            manager.resolve_active(&mut ChatSession::new()).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_delete_all_keeps_facts() {
        let manager = manager(5).await;
        let mut session = ChatSession::new();
        let id = manager.create_conversation("chat").await.unwrap();
        manager.set_active(&mut session, id);
        manager
            .store()
            .upsert_fact(&Fact::new("name", "Alice"))
            .await
            .unwrap();

        manager.delete_all_conversations(&mut session).await.unwrap();

        assert!(manager.list_conversations().await.unwrap().is_empty());
        assert_eq!(manager.active(&session), None);
        assert_eq!(
            manager.facts().await.unwrap(),
            vec![Fact::new("name", "Alice")]
        );
    }

    #[tokio::test]
    async fn test_hard_reset_clears_everything() {
        let manager = manager(5).await;
        let mut session = ChatSession::new();
        let id = manager.create_conversation("chat").await.unwrap();
        manager.set_active(&mut session, id);
        manager
            .store()
            .append_message(id, MessageRole::User, "hello")
            .await
            .unwrap();
        manager
            .store()
            .upsert_fact(&Fact::new("name", "Alice"))
            .await
            .unwrap();

        manager.hard_reset(&mut session).await.unwrap();

        assert!(manager.list_conversations().await.unwrap().is_empty());
        assert!(manager.messages(id, None).await.unwrap().is_empty());
        assert!(manager.facts().await.unwrap().is_empty());
        assert_eq!(manager.active(&session), None);
    }
}
