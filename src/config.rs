//! Environment-driven configuration
//!
//! Values come from the process environment (optionally seeded from a
//! `.env` file by the binaries via `dotenv`).

use crate::audit::DEFAULT_AUDIT_CAPACITY;
use crate::error::AdvisorError;
use crate::session::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_IDLE_TIMEOUT};
use crate::Result;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

/// Settings for the chat-completions backend
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Settings for the embedding backend. Without a model the offline
/// hashed embedder is used.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub memory_window: usize,
    pub max_iterations: u32,
    /// Knowledge passages scoring at or below this are not returned
    pub knowledge_min_score: f32,
    /// Sessions untouched for this long are dropped
    pub session_idle_timeout: Duration,
    pub max_sessions: usize,
    /// Run records kept for `/api/runs` before the oldest are dropped
    pub audit_capacity: usize,
    pub database_url: Option<String>,
    pub knowledge_index_path: Option<PathBuf>,
    pub port: u16,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings {
                base_url: DEFAULT_LLM_BASE_URL.to_string(),
                api_key: None,
                model: DEFAULT_LLM_MODEL.to_string(),
                temperature: 0.3,
                max_tokens: 1024,
                timeout: Duration::from_secs(60),
            },
            embedding: EmbeddingSettings {
                base_url: DEFAULT_LLM_BASE_URL.to_string(),
                api_key: None,
                model: None,
            },
            memory_window: 10,
            max_iterations: 10,
            knowledge_min_score: 0.0,
            session_idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
            max_sessions: DEFAULT_MAX_SESSIONS,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            database_url: None,
            knowledge_index_path: None,
            port: 8080,
        }
    }
}

impl AdvisorConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();

        let llm_base_url = get("LLM_BASE_URL")
            .unwrap_or(defaults.llm.base_url)
            .trim_end_matches('/')
            .to_string();
        let api_key = get("LLM_API_KEY").or_else(|| get("GROQ_API_KEY"));

        let timeout_secs: u64 = parse_or(
            "LLM_TIMEOUT_SECS",
            get("LLM_TIMEOUT_SECS"),
            defaults.llm.timeout.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(AdvisorError::Config(
                "LLM_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        let llm = LlmSettings {
            base_url: llm_base_url.clone(),
            api_key: api_key.clone(),
            model: get("LLM_MODEL").unwrap_or(defaults.llm.model),
            temperature: parse_or("LLM_TEMPERATURE", get("LLM_TEMPERATURE"), defaults.llm.temperature)?,
            max_tokens: parse_or("LLM_MAX_TOKENS", get("LLM_MAX_TOKENS"), defaults.llm.max_tokens)?,
            timeout: Duration::from_secs(timeout_secs),
        };

        let embedding = EmbeddingSettings {
            base_url: get("EMBEDDING_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(llm_base_url),
            api_key: get("EMBEDDING_API_KEY").or(api_key),
            model: get("EMBEDDING_MODEL"),
        };

        let memory_window: usize =
            parse_or("MEMORY_WINDOW", get("MEMORY_WINDOW"), defaults.memory_window)?;
        if memory_window == 0 {
            return Err(AdvisorError::Config(
                "MEMORY_WINDOW must be at least 1".to_string(),
            ));
        }

        let max_iterations: u32 = parse_or(
            "AGENT_MAX_ITERATIONS",
            get("AGENT_MAX_ITERATIONS"),
            defaults.max_iterations,
        )?;
        if max_iterations == 0 {
            return Err(AdvisorError::Config(
                "AGENT_MAX_ITERATIONS must be at least 1".to_string(),
            ));
        }

        let knowledge_min_score: f32 = parse_or(
            "KNOWLEDGE_MIN_SCORE",
            get("KNOWLEDGE_MIN_SCORE"),
            defaults.knowledge_min_score,
        )?;
        if !knowledge_min_score.is_finite() {
            return Err(AdvisorError::Config(
                "KNOWLEDGE_MIN_SCORE must be a finite number".to_string(),
            ));
        }

        let idle_secs: u64 = parse_or(
            "SESSION_IDLE_SECS",
            get("SESSION_IDLE_SECS"),
            defaults.session_idle_timeout.as_secs(),
        )?;
        let max_sessions: usize = parse_or("MAX_SESSIONS", get("MAX_SESSIONS"), defaults.max_sessions)?;
        let audit_capacity: usize =
            parse_or("AUDIT_CAPACITY", get("AUDIT_CAPACITY"), defaults.audit_capacity)?;
        for (key, value) in [
            ("SESSION_IDLE_SECS", idle_secs as usize),
            ("MAX_SESSIONS", max_sessions),
            ("AUDIT_CAPACITY", audit_capacity),
        ] {
            if value == 0 {
                return Err(AdvisorError::Config(format!("{} must be at least 1", key)));
            }
        }

        let port_value = get("PORT").or_else(|| get("API_PORT"));

        Ok(Self {
            llm,
            embedding,
            memory_window,
            max_iterations,
            knowledge_min_score,
            session_idle_timeout: Duration::from_secs(idle_secs),
            max_sessions,
            audit_capacity,
            database_url: get("DATABASE_URL"),
            knowledge_index_path: get("KNOWLEDGE_INDEX_PATH").map(PathBuf::from),
            port: parse_or("PORT", port_value, defaults.port)?,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(raw) => raw.parse::<T>().map_err(|_| {
            AdvisorError::Config(format!("{} has an invalid value: {:?}", key, raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AdvisorConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AdvisorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.llm.base_url, DEFAULT_LLM_BASE_URL);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.memory_window, 10);
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.port, 8080);
        assert!(config.embedding.model.is_none());
        assert_eq!(config.knowledge_min_score, 0.0);
        assert_eq!(config.session_idle_timeout, Duration::from_secs(3600));
        assert_eq!(config.max_sessions, 1000);
        assert_eq!(config.audit_capacity, 10_000);
    }

    #[test]
    fn test_groq_key_fallback_and_overrides() {
        let config = config_from(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("LLM_BASE_URL", "http://localhost:9000/v1/"),
            ("MEMORY_WINDOW", "6"),
            ("AGENT_MAX_ITERATIONS", "12"),
            ("API_PORT", "9090"),
        ])
        .unwrap();

        assert_eq!(config.llm.api_key.as_deref(), Some("gsk_test"));
        assert_eq!(config.llm.base_url, "http://localhost:9000/v1");
        assert_eq!(config.embedding.base_url, "http://localhost:9000/v1");
        assert_eq!(config.embedding.api_key.as_deref(), Some("gsk_test"));
        assert_eq!(config.memory_window, 6);
        assert_eq!(config.max_iterations, 12);
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        let err = config_from(&[("LLM_MAX_TOKENS", "lots")]).unwrap_err();
        assert!(matches!(err, AdvisorError::Config(_)));

        let err = config_from(&[("MEMORY_WINDOW", "0")]).unwrap_err();
        assert!(err.to_string().contains("MEMORY_WINDOW"));
    }

    #[test]
    fn test_rejects_zero_limits() {
        for key in ["LLM_TIMEOUT_SECS", "SESSION_IDLE_SECS", "MAX_SESSIONS", "AUDIT_CAPACITY"] {
            let err = config_from(&[(key, "0")]).unwrap_err();
            assert!(matches!(err, AdvisorError::Config(_)), "{} accepted 0", key);
            assert!(err.to_string().contains(key));
        }

        let config = config_from(&[("LLM_TIMEOUT_SECS", "5"), ("KNOWLEDGE_MIN_SCORE", "0.2")]).unwrap();
        assert_eq!(config.llm.timeout, Duration::from_secs(5));
        assert_eq!(config.knowledge_min_score, 0.2);
    }
}
