//! Conversation lifecycle, retention and session pointers.

pub mod manager;
pub mod session;

pub use manager::ConversationManager;
pub use session::ChatSession;
