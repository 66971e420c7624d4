//! Prompt construction.

pub mod prompt_builder;

pub use prompt_builder::{PromptAssembler, SYSTEM_PREAMBLE};
