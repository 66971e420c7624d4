//! Application state shared across all request handlers.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::agent::{Agent, Autocompleter};
use crate::llm::generator::Generator;
use crate::llm::ollama::OllamaGenerator;
use crate::memory::conversations::{ChatSession, ConversationManager};
use crate::memory::core::config::AssistantConfig;
use crate::memory::core::errors::MemoryResult;
use crate::memory::engine::ChatOrchestrator;
use crate::memory::storage::chat_store::{ChatStore, SqliteChatStore};

/// Session key used when a client sends no `x-session-id` header.
pub const DEFAULT_SESSION: &str = "default";

/// Shared application state.
pub struct AppState {
    /// Command router and chat pipeline.
    pub agent: Agent,
    /// Autocomplete helper.
    pub autocompleter: Autocompleter,
    /// Ollama client, when the state talks to a real server.
    pub ollama: Option<Arc<OllamaGenerator>>,
    /// Model name reported by the health endpoint.
    pub model_name: String,
    sessions: DashMap<String, Arc<Mutex<ChatSession>>>,
}

impl AppState {
    /// Open the configured database and connect to Ollama.
    ///
    /// # Errors
    /// Returns an error if the store or the HTTP client cannot be created.
    pub async fn new(config: &AssistantConfig) -> MemoryResult<Arc<Self>> {
        let store = SqliteChatStore::new(&config.storage).await?;
        let ollama = Arc::new(OllamaGenerator::new(&config.llm)?);

        let mut state = Self::from_parts(Arc::new(store), ollama.clone(), config);
        state.ollama = Some(ollama);
        Ok(Arc::new(state))
    }

    /// Build state over an arbitrary store and generator.
    #[must_use]
    pub fn from_parts(
        store: Arc<dyn ChatStore>,
        generator: Arc<dyn Generator>,
        config: &AssistantConfig,
    ) -> Self {
        let manager = Arc::new(ConversationManager::new(store, &config.retention));
        let orchestrator = ChatOrchestrator::new(manager, Arc::clone(&generator), config);

        Self {
            agent: Agent::new(orchestrator),
            autocompleter: Autocompleter::new(generator, config.autocomplete),
            ollama: None,
            model_name: config.llm.model.clone(),
            sessions: DashMap::new(),
        }
    }

    /// Conversation manager.
    #[must_use]
    pub const fn manager(&self) -> &Arc<ConversationManager> {
        self.agent.orchestrator().manager()
    }

    /// Session for a client key, created on first use.
    #[must_use]
    pub fn session(&self, key: &str) -> Arc<Mutex<ChatSession>> {
        self.sessions.entry(key.to_string()).or_default().clone()
    }

    /// Detach every session from its conversation, after a bulk delete.
    pub async fn clear_all_sessions(&self) {
        let sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for session in sessions {
            let mut guard = session.lock().await;
            self.manager().clear_active(&mut guard);
        }
    }
}
