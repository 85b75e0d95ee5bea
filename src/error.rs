use crate::agent::AgentError;
use crate::answer::AnswerError;
use crate::chunking::ChunkError;
use crate::embedding::{EmbeddingError, VectorIndexError};
use crate::retrieval::SearchError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for lensrag
#[derive(Error, Debug)]
pub enum LensError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Chunking failed (unknown strategy, invalid profile, tokenizer)
    #[error(transparent)]
    Chunking(#[from] ChunkError),

    /// Upstream embedding service failure
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Vector collection errors
    #[error(transparent)]
    VectorIndex(#[from] VectorIndexError),

    /// Retrieval failures, including reranking
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Answer assembly failures, including the no-relevant-chunks case
    #[error(transparent)]
    Answer(#[from] AnswerError),

    /// Question routing failures
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for lensrag operations
pub type Result<T> = std::result::Result<T, LensError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_context_keeps_cause() {
        let result: Result<()> = Err(LensError::Config("Unknown profile 'fast'".to_string()));
        let err = result.context("Failed to load configuration").unwrap_err();

        assert_eq!(err.to_string(), "Failed to load configuration");
        let cause = err.downcast_ref::<LensError>().unwrap();
        assert!(matches!(cause, LensError::Config(msg) if msg.contains("fast")));
    }
}
