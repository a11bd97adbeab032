//! Error types for the UMKM advisor

use thiserror::Error;

/// Result type alias for advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {

    // =============================
    // Agent Loop Errors
    // =============================

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Knowledge index is empty: {0}")]
    EmptyIndex(String),

    #[error("Max iterations exceeded: {0}")]
    MaxIterationsExceeded(String),

    #[error("Backend error: {0}")]
    Backend(String),

    // =============================
    // Startup / Infrastructure Errors
    // =============================

    #[error("Duplicate tool name: {0}")]
    DuplicateName(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
