//! Language-model backends
//!
//! The orchestrator only sees `LanguageModel::complete`, which turns the
//! current context into a `Decision`: answer now, or call a tool.

pub mod keyword;
pub mod openai;
pub mod react;

pub use keyword::KeywordModel;
pub use openai::OpenAiCompatibleClient;
pub use react::parse_react_output;

use crate::config::LlmSettings;
use crate::models::{Decision, ScratchpadStep, ToolSpec, Utterance};
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Everything the backend needs for one THINKING step
#[derive(Debug, Clone, Copy)]
pub struct ThinkRequest<'a> {
    pub system_prompt: &'a str,
    pub history: &'a [Utterance],
    pub input: &'a str,
    pub scratchpad: &'a [ScratchpadStep],
    pub tools: &'a [ToolSpec],
}

/// Trait for decision generation (LLM controlled)
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: ThinkRequest<'_>) -> Result<Decision>;
}

/// Pick the hosted backend when an API key is configured, otherwise the
/// offline keyword model.
pub fn model_from_settings(settings: &LlmSettings) -> Result<Arc<dyn LanguageModel>> {
    if settings.api_key.is_some() {
        Ok(Arc::new(OpenAiCompatibleClient::new(settings.clone())?))
    } else {
        warn!("No LLM API key configured (LLM_API_KEY / GROQ_API_KEY), using offline keyword model");
        Ok(Arc::new(KeywordModel))
    }
}

/// Replays a fixed list of decisions. Once the script is exhausted the last
/// decision repeats.
pub struct ScriptedModel {
    script: Vec<Decision>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(script: Vec<Decision>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `complete` calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _request: ThinkRequest<'_>) -> Result<Decision> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let decision = self
            .script
            .get(call)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_else(|| Decision::final_answer(""));
        Ok(decision)
    }
}
