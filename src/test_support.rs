//! Test doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::llm::generator::{GenerateFuture, Generator, GeneratorError};
use crate::memory::core::config::SamplingConfig;

/// One recorded generation call.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub prompt: String,
    pub sampling: SamplingConfig,
}

/// Generator that replays canned replies in order and records every call.
/// Once the script runs out it answers `NONE`.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GeneratorError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    pub fn new(replies: impl IntoIterator<Item = Result<String, GeneratorError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|reply| Ok((*reply).to_string())))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Generator for ScriptedGenerator {
    fn generate<'a>(&'a self, prompt: &'a str, sampling: SamplingConfig) -> GenerateFuture<'a> {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            sampling,
        });
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("NONE".to_string()));
        Box::pin(async move { reply })
    }
}
