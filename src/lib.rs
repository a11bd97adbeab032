//! INA - UMKM Advisor
//!
//! A conversational business assistant for Indonesian small and micro
//! enterprises that:
//! - Answers through a bounded tool-using agent loop
//! - Runs deterministic tools (SWOT, financial projection, platform advice)
//! - Retrieves guidance passages from a small embedding index
//! - Keeps a sliding conversation window per chat session
//! - Persists the business profile and an interaction log
//!
//! AGENT LOOP:
//! THINKING → ACTING → OBSERVING → ... → ANSWERING → DONE

pub mod agent;
pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod memory;
pub mod models;
pub mod session;
pub mod store;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use agent::{AgentOrchestrator, AgentSettings};
pub use config::AdvisorConfig;
pub use error::AdvisorError;
pub use models::*;
pub use session::{ChatSession, QuickAction, SessionManager, SessionServices};
