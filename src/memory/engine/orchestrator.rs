//! One user turn, end to end.

use std::sync::Arc;

use tracing::{debug, info};

use crate::llm::generator::{Generator, generate_or_degrade};
use crate::memory::conversations::{ChatSession, ConversationManager};
use crate::memory::core::config::{AssistantConfig, SamplingConfig};
use crate::memory::core::errors::StorageResult;
use crate::memory::core::ids::ConversationId;
use crate::memory::core::records::MessageRole;
use crate::memory::ingest::fact_extractor::FactExtractor;
use crate::memory::prompt::prompt_builder::PromptAssembler;

/// Composes extraction, storage, prompt assembly and generation for a turn.
pub struct ChatOrchestrator {
    manager: Arc<ConversationManager>,
    extractor: FactExtractor,
    assembler: PromptAssembler,
    generator: Arc<dyn Generator>,
    chat_sampling: SamplingConfig,
    title_max_chars: usize,
}

impl ChatOrchestrator {
    /// Build an orchestrator from the assistant configuration.
    #[must_use]
    pub fn new(
        manager: Arc<ConversationManager>,
        generator: Arc<dyn Generator>,
        config: &AssistantConfig,
    ) -> Self {
        Self {
            manager,
            extractor: FactExtractor::new(Arc::clone(&generator), config.extractor),
            assembler: PromptAssembler::new(config.history.limit),
            generator,
            chat_sampling: config.chat,
            title_max_chars: config.titles.max_chars,
        }
    }

    /// Conversation manager shared with the orchestrator.
    #[must_use]
    pub const fn manager(&self) -> &Arc<ConversationManager> {
        &self.manager
    }

    /// Process one user turn and return the assistant reply.
    ///
    /// A failing generator does not fail the turn: its fixed error text is
    /// stored and returned as the reply.
    ///
    /// # Errors
    /// Returns an error if storage access fails. A session pointing at a
    /// conversation that no longer exists gets a fresh conversation.
    pub async fn handle_turn(
        &self,
        session: &mut ChatSession,
        user_message: &str,
    ) -> StorageResult<String> {
        let conversation_id = self.ensure_conversation(session, user_message).await?;
        let store = self.manager.store();

        // Stored before the user message so the fact shows up in this turn's prompt.
        if let Some(fact) = self.extractor.extract(user_message).await {
            store.upsert_fact(&fact).await?;
            info!("Stored fact {:?}", fact.key);
        }

        store
            .append_message(conversation_id, MessageRole::User, user_message)
            .await?;

        let facts = store.list_facts().await?;
        let history = store
            .load_messages(conversation_id, Some(self.assembler.history_limit()))
            .await?;
        let prompt = self.assembler.render(&facts, &history);
        debug!(
            "Prompt for conversation {conversation_id}: {} facts, {} messages, {} chars",
            facts.len(),
            history.len(),
            prompt.len()
        );

        let reply = generate_or_degrade(self.generator.as_ref(), &prompt, self.chat_sampling).await;

        store
            .append_message(conversation_id, MessageRole::Assistant, &reply)
            .await?;

        Ok(reply)
    }

    async fn ensure_conversation(
        &self,
        session: &mut ChatSession,
        user_message: &str,
    ) -> StorageResult<ConversationId> {
        if let Some(id) = self.manager.resolve_active(session).await? {
            return Ok(id);
        }

        let title = truncate_title(user_message, self.title_max_chars);
        let id = self.manager.create_conversation(&title).await?;
        self.manager.set_active(session, id);
        Ok(id)
    }
}

/// First `max_chars` characters of the utterance.
fn truncate_title(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::generator::{GeneratorError, UNAVAILABLE_REPLY};
    use crate::memory::core::config::RetentionConfig;
    use crate::memory::core::records::Fact;
    use crate::memory::storage::chat_store::SqliteChatStore;
    use crate::test_support::ScriptedGenerator;

    async fn orchestrator(
        generator: Arc<ScriptedGenerator>,
        config: &AssistantConfig,
    ) -> ChatOrchestrator {
        let store = SqliteChatStore::open_in_memory().await.unwrap();
        let manager = Arc::new(ConversationManager::new(Arc::new(store), &config.retention));
        ChatOrchestrator::new(manager, generator, config)
    }

    #[test]
    fn test_truncate_title_counts_characters() {
        assert_eq!(truncate_title("short", 30), "short");
        assert_eq!(truncate_title("ééééé", 3), "ééé");
        assert_eq!(truncate_title(&"x".repeat(40), 30).len(), 30);
    }

    #[tokio::test]
    async fn test_first_turn_creates_conversation_and_uses_fact() {
        let generator = Arc::new(ScriptedGenerator::replying(&[
            "name=Alice",
            "Nice to meet you, Alice!",
        ]));
        let config = AssistantConfig::default();
        let orchestrator = orchestrator(generator.clone(), &config).await;
        let mut session = ChatSession::new();
        let utterance = "Hello there, my name is Alice and I live in Oslo";

        let reply = orchestrator.handle_turn(&mut session, utterance).await.unwrap();
        assert_eq!(reply, "Nice to meet you, Alice!");

        let manager = orchestrator.manager();
        let conversations = manager.list_conversations().await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].title, "Hello there, my name is Alice ");
        assert_eq!(session.active(), Some(conversations[0].id));

        let messages = manager.messages(conversations[0].id, None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].text, utterance);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].text, reply);

        assert_eq!(manager.facts().await.unwrap(), vec![Fact::new("name", "Alice")]);

        let calls = generator.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].sampling, SamplingConfig::extraction());
        assert_eq!(calls[1].sampling, SamplingConfig::chat());
        assert_eq!(
            calls[1].prompt,
            format!(
                "You are a helpful offline AI assistant.\n\n\
                 Important information about the user:\n\
                 - name: Alice\n\n\
                 User: {utterance}\n\
                 AI:"
            )
        );
    }

    #[tokio::test]
    async fn test_follow_up_turn_reuses_active_conversation() {
        let generator = Arc::new(ScriptedGenerator::replying(&[
            "NONE",
            "first reply",
            "NONE",
            "second reply",
        ]));
        let config = AssistantConfig::default();
        let orchestrator = orchestrator(generator.clone(), &config).await;
        let mut session = ChatSession::new();

        orchestrator.handle_turn(&mut session, "one").await.unwrap();
        orchestrator.handle_turn(&mut session, "two").await.unwrap();

        let manager = orchestrator.manager();
        assert_eq!(manager.list_conversations().await.unwrap().len(), 1);
        assert!(manager.facts().await.unwrap().is_empty());

        let prompt = &generator.calls()[3].prompt;
        assert!(prompt.ends_with("User: one\nAI: first reply\nUser: two\nAI:"));
        assert!(!prompt.contains("Important information"));
    }

    #[tokio::test]
    async fn test_generator_failure_is_persisted_as_reply() {
        let generator = Arc::new(ScriptedGenerator::new([
            Ok("NONE".to_string()),
            Err(GeneratorError::Unavailable("connection refused".to_string())),
        ]));
        let config = AssistantConfig::default();
        let orchestrator = orchestrator(generator, &config).await;
        let mut session = ChatSession::new();

        let reply = orchestrator.handle_turn(&mut session, "hello").await.unwrap();
        assert_eq!(reply, UNAVAILABLE_REPLY);

        let id = session.active().unwrap();
        let messages = orchestrator.manager().messages(id, None).await.unwrap();
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].text, UNAVAILABLE_REPLY);
    }

    #[tokio::test]
    async fn test_prompt_history_is_capped() {
        let generator = Arc::new(ScriptedGenerator::replying(&[
            "NONE", "r1", "NONE", "r2", "NONE", "r3",
        ]));
        let mut config = AssistantConfig::default();
        config.history.limit = 2;
        let orchestrator = orchestrator(generator.clone(), &config).await;
        let mut session = ChatSession::new();

        for text in ["u1", "u2", "u3"] {
            orchestrator.handle_turn(&mut session, text).await.unwrap();
        }

        let prompt = &generator.calls()[5].prompt;
        assert!(prompt.ends_with("\n\nAI: r2\nUser: u3\nAI:"));
        assert!(!prompt.contains("u2"));
    }

    #[tokio::test]
    async fn test_dangling_session_opens_fresh_conversation() {
        let generator = Arc::new(ScriptedGenerator::replying(&["NONE", "here"]));
        let config = AssistantConfig::default();
        let orchestrator = orchestrator(generator, &config).await;
        let mut session = ChatSession::new();
        orchestrator
            .manager()
            .set_active(&mut session, ConversationId::new(77));

        let reply = orchestrator.handle_turn(&mut session, "anyone?").await.unwrap();
        assert_eq!(reply, "here");

        let listed = orchestrator.manager().list_conversations().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "anyone?");
        assert_eq!(session.active(), Some(listed[0].id));
        assert_ne!(listed[0].id, ConversationId::new(77));
    }

    #[tokio::test]
    async fn test_new_turn_after_eviction_of_other_session() {
        let generator = Arc::new(ScriptedGenerator::replying(&[]));
        let mut config = AssistantConfig::default();
        config.retention = RetentionConfig {
            max_conversations: 1,
        };
        let orchestrator = orchestrator(generator, &config).await;
        let mut first = ChatSession::new();
        let mut second = ChatSession::new();

        orchestrator.handle_turn(&mut first, "A").await.unwrap();
        let a = first.active().unwrap();
        orchestrator.handle_turn(&mut second, "B").await.unwrap();

        let manager = orchestrator.manager();
        let listed = manager.list_conversations().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(Some(listed[0].id), second.active());
        assert!(manager.messages(a, None).await.unwrap().is_empty());

        // The first session's conversation was evicted; its next turns go
        // to a fresh conversation instead of failing.
        orchestrator.handle_turn(&mut first, "A again").await.unwrap();
        let reopened = first.active().unwrap();
        assert_ne!(reopened, a);
        orchestrator.handle_turn(&mut first, "A once more").await.unwrap();
        assert_eq!(first.active(), Some(reopened));

        let listed = manager.list_conversations().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, reopened);
        assert_eq!(listed[0].title, "A again");
        assert_eq!(manager.messages(reopened, None).await.unwrap().len(), 4);
    }
}
