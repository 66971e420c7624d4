//! The text-generation capability consumed by the assistant.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tracing::warn;

use crate::memory::core::config::SamplingConfig;

/// Reply shown when the generation service cannot be reached.
pub const UNAVAILABLE_REPLY: &str = "Error: Cannot connect to Ollama. Is it running?";
/// Reply shown when the generation service answers with an error.
pub const BAD_RESPONSE_REPLY: &str = "Error: LLM returned a bad response.";

/// Boxed future returned by [`Generator::generate`].
pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Result<String, GeneratorError>> + Send + 'a>>;

/// Failure of a generation call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GeneratorError {
    /// Transport or connection failure.
    #[error("generation service unavailable: {0}")]
    Unavailable(String),
    /// Non-success status or undecodable body.
    #[error("generation service returned a bad response: {0}")]
    BadResponse(String),
}

impl GeneratorError {
    /// Fixed human-readable text that replaces the reply on failure.
    #[must_use]
    pub const fn fallback_reply(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => UNAVAILABLE_REPLY,
            Self::BadResponse(_) => BAD_RESPONSE_REPLY,
        }
    }
}

/// Text generation backend.
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt`.
    ///
    /// # Errors
    /// Returns [`GeneratorError`] if the service is unreachable or misbehaves.
    fn generate<'a>(&'a self, prompt: &'a str, sampling: SamplingConfig) -> GenerateFuture<'a>;
}

/// Generate a completion, replacing any failure with its fixed fallback text.
pub async fn generate_or_degrade(
    generator: &dyn Generator,
    prompt: &str,
    sampling: SamplingConfig,
) -> String {
    match generator.generate(prompt, sampling).await {
        Ok(text) => text,
        Err(err) => {
            warn!("Generation degraded: {err}");
            err.fallback_reply().to_string()
        }
    }
}
