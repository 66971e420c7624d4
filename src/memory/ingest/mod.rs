//! Ingestion of user input into long-term memory.

pub mod fact_extractor;

pub use fact_extractor::{FactExtractor, parse_fact_reply};
