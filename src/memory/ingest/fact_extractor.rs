//! LLM-assisted extraction of long-term user facts.
//!
//! The model is asked to answer with a tiny grammar:
//!
//! ```text
//! reply := "NONE" | key "=" value
//! ```
//!
//! Anything else is treated as "no fact".

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::generator::Generator;
use crate::memory::core::config::SamplingConfig;
use crate::memory::core::records::Fact;

/// Extracts at most one durable fact from a user utterance.
pub struct FactExtractor {
    generator: Arc<dyn Generator>,
    sampling: SamplingConfig,
}

impl FactExtractor {
    /// Create an extractor using the given sampling (normally 0.2 / 32 tokens).
    #[must_use]
    pub fn new(generator: Arc<dyn Generator>, sampling: SamplingConfig) -> Self {
        Self {
            generator,
            sampling,
        }
    }

    /// Ask the model for a fact contained in `user_message`.
    ///
    /// Generator failures and malformed replies both yield `None`.
    pub async fn extract(&self, user_message: &str) -> Option<Fact> {
        let prompt = extraction_prompt(user_message);
        let reply = match self.generator.generate(&prompt, self.sampling).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("Fact extraction skipped: {err}");
                return None;
            }
        };

        let fact = parse_fact_reply(&reply);
        if fact.is_none() {
            debug!("No fact in extraction reply {reply:?}");
        }
        fact
    }
}

fn extraction_prompt(user_message: &str) -> String {
    format!(
        "Extract important personal information from the message.
If none, respond with NONE.

Respond strictly in this format:
key=value

Message:
{user_message}
"
    )
}

/// Parse a model reply into a fact.
///
/// Only the first non-empty line is considered. It is split on its first `=`;
/// both halves are trimmed and must be non-empty.
#[must_use]
pub fn parse_fact_reply(reply: &str) -> Option<Fact> {
    let line = reply.lines().map(str::trim).find(|line| !line.is_empty())?;
    if line.eq_ignore_ascii_case("NONE") {
        return None;
    }

    let (key, value) = line.split_once('=')?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some(Fact::new(key, value))
}
