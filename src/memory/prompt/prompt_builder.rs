//! Prompt builder for memory context.

use crate::memory::core::records::{Fact, Message};

/// Opening line of every chat prompt.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful offline AI assistant.";

/// Header of the known-facts block.
const FACTS_HEADER: &str = "Important information about the user:";

/// Cue asking the model to continue as the assistant.
const ASSISTANT_CUE: &str = "AI:";

/// Renders facts and recent history into the text sent to the generator.
#[derive(Clone, Debug)]
pub struct PromptAssembler {
    history_limit: usize,
}

impl PromptAssembler {
    /// Create an assembler keeping at most `history_limit` messages.
    #[must_use]
    pub const fn new(history_limit: usize) -> Self {
        Self { history_limit }
    }

    /// Maximum number of messages rendered.
    #[must_use]
    pub const fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Build a deterministic prompt.
    ///
    /// `history` is expected oldest first; only its last `history_limit`
    /// messages are rendered. Facts are rendered in the order given.
    #[must_use]
    pub fn render(&self, facts: &[Fact], history: &[Message]) -> String {
        let skip = history.len().saturating_sub(self.history_limit);
        let window = &history[skip..];

        let mut out = String::with_capacity(estimate_len(facts, window));
        out.push_str(SYSTEM_PREAMBLE);
        out.push_str("\n\n");

        if !facts.is_empty() {
            out.push_str(FACTS_HEADER);
            out.push('\n');
            for fact in facts {
                render_fact(&mut out, fact);
            }
            out.push('\n');
        }

        for message in window {
            render_message(&mut out, message);
        }

        out.push_str(ASSISTANT_CUE);
        out
    }
}

fn estimate_len(facts: &[Fact], window: &[Message]) -> usize {
    let facts_len: usize = facts.iter().map(|f| f.key.len() + f.value.len() + 5).sum();
    let history_len: usize = window.iter().map(|m| m.text.len() + 6).sum();
    SYSTEM_PREAMBLE.len() + FACTS_HEADER.len() + facts_len + history_len + 8
}

fn render_fact(out: &mut String, fact: &Fact) {
    out.push_str("- ");
    out.push_str(&fact.key);
    out.push_str(": ");
    out.push_str(&fact.value);
    out.push('\n');
}

fn render_message(out: &mut String, message: &Message) {
    out.push_str(message.role.label());
    out.push_str(": ");
    out.push_str(&message.text);
    out.push('\n');
}
