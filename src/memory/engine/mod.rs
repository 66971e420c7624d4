//! Turn orchestration over the memory subsystem.

pub mod orchestrator;

pub use orchestrator::ChatOrchestrator;
