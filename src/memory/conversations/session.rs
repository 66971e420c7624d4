//! Per-client chat session state.

use crate::memory::core::ids::ConversationId;

/// Transient state of one client: which conversation new turns go to.
///
/// Never persisted. Only [`ConversationManager`](super::ConversationManager)
/// changes the active pointer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatSession {
    active: Option<ConversationId>,
}

impl ChatSession {
    /// Create a session with no active conversation.
    #[must_use]
    pub const fn new() -> Self {
        Self { active: None }
    }

    /// The active conversation, if any.
    #[must_use]
    pub const fn active(&self) -> Option<ConversationId> {
        self.active
    }

    pub(crate) const fn set_active(&mut self, id: ConversationId) {
        self.active = Some(id);
    }

    pub(crate) const fn clear(&mut self) {
        self.active = None;
    }
}
