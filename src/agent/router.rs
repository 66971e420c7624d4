//! Routing of user input to tools or to the chat pipeline.

use tracing::debug;

use crate::agent::tools;
use crate::memory::conversations::ChatSession;
use crate::memory::core::errors::StorageResult;
use crate::memory::engine::ChatOrchestrator;

/// What a line of user input asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// `open <program>`
    OpenApp(&'a str),
    /// `read <path>`
    ReadFile(&'a str),
    /// Anything else.
    Chat(&'a str),
}

/// Classify user input. Tool commands must be explicit: the first word is
/// matched case-insensitively and the argument keeps its original case.
#[must_use]
pub fn parse_command(input: &str) -> Command<'_> {
    if let Some((verb, argument)) = split_verb(input.trim()) {
        if verb.eq_ignore_ascii_case("open") {
            return Command::OpenApp(argument);
        }
        if verb.eq_ignore_ascii_case("read") {
            return Command::ReadFile(argument);
        }
    }
    Command::Chat(input)
}

fn split_verb(text: &str) -> Option<(&str, &str)> {
    let (verb, rest) = text.split_once(char::is_whitespace)?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some((verb, rest))
}

/// Front door of the assistant: tools first, chat otherwise.
pub struct Agent {
    orchestrator: ChatOrchestrator,
}

impl Agent {
    /// Wrap a chat orchestrator.
    #[must_use]
    pub const fn new(orchestrator: ChatOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Chat pipeline behind the agent.
    #[must_use]
    pub const fn orchestrator(&self) -> &ChatOrchestrator {
        &self.orchestrator
    }

    /// Handle one line of user input. Tool commands leave conversation state alone.
    ///
    /// # Errors
    /// Returns an error if the chat pipeline hits a storage failure.
    pub async fn handle(&self, session: &mut ChatSession, input: &str) -> StorageResult<String> {
        match parse_command(input) {
            Command::OpenApp(name) => Ok(tools::open_app(name).await),
            Command::ReadFile(path) => {
                debug!("Reading file {path:?}");
                Ok(tools::read_file(path).await)
            }
            Command::Chat(text) => self.orchestrator.handle_turn(session, text).await,
        }
    }
}
