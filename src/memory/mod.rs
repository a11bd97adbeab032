//! Agent Memory System
//!
//! Bounded conversation window handed to the orchestrator as context.

pub mod store;

pub use store::{ConversationMemory, DEFAULT_WINDOW};
