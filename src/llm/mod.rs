//! Text-generation capability and its Ollama implementation.

pub mod generator;
pub mod ollama;

pub use generator::{
    BAD_RESPONSE_REPLY, GenerateFuture, Generator, GeneratorError, UNAVAILABLE_REPLY,
    generate_or_degrade,
};
pub use ollama::OllamaGenerator;
