use crate::chunking::{is_supported_encoding, SUPPORTED_ENCODINGS};
use crate::config::{Config, SCHEMA_VERSION};
use crate::embedding::embedding_dimension;
use crate::error::{LensError, Result, ValidationError};

const EMBEDDING_MODES: [&str; 2] = ["online", "offline"];
const RERANK_PROVIDERS: [&str; 3] = ["cohere", "local", "none"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem before failing
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_vector_store(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_reranker(config, &mut errors);
        Self::validate_profiles(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LensError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        let encoding = &config.chunking.encoding;
        if !is_supported_encoding(encoding) {
            errors.push(ValidationError::new(
                "chunking.encoding",
                format!(
                    "Encoding must be one of {:?}, got '{}'",
                    SUPPORTED_ENCODINGS, encoding
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let embedding = &config.embedding;

        if !EMBEDDING_MODES.contains(&embedding.mode.as_str()) {
            errors.push(ValidationError::new(
                "embedding.mode",
                format!("Mode must be 'offline' or 'online', got '{}'", embedding.mode),
            ));
        }

        if embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        } else if embedding_dimension(&embedding.model).is_none() {
            errors.push(ValidationError::new(
                "embedding.model",
                format!("Unknown embedding model '{}'", embedding.model),
            ));
        }

        if embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if embedding.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "embedding.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }

        // API key presence is checked when the client is built, not here
        if embedding.mode == "online" && embedding.api_base.is_empty() {
            errors.push(ValidationError::new(
                "embedding.api_base",
                "API base URL cannot be empty in online mode",
            ));
        }
    }

    fn validate_vector_store(config: &Config, errors: &mut Vec<ValidationError>) {
        let store = &config.vector_store;

        if store.collection_prefix.is_empty() {
            errors.push(ValidationError::new(
                "vector_store.collection_prefix",
                "Collection prefix cannot be empty",
            ));
        }

        if store.max_results == 0 {
            errors.push(ValidationError::new(
                "vector_store.max_results",
                "Max results must be greater than 0",
            ));
        }

        let threshold = store.similarity_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            errors.push(ValidationError::new(
                "vector_store.similarity_threshold",
                format!("Threshold must be between -1.0 and 1.0, got {}", threshold),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.semantic_overfetch == 0 {
            errors.push(ValidationError::new(
                "retrieval.semantic_overfetch",
                "Over-fetch factor must be at least 1",
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.bm25_weight) {
            errors.push(ValidationError::new(
                "retrieval.bm25_weight",
                format!(
                    "BM25 weight must be between 0.0 and 1.0, got {}",
                    retrieval.bm25_weight
                ),
            ));
        }

        if retrieval.rerank_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.rerank_top_k",
                "Rerank candidate count must be greater than 0",
            ));
        }
    }

    fn validate_reranker(config: &Config, errors: &mut Vec<ValidationError>) {
        let reranker = &config.reranker;

        if !RERANK_PROVIDERS.contains(&reranker.provider.as_str()) {
            errors.push(ValidationError::new(
                "reranker.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    RERANK_PROVIDERS, reranker.provider
                ),
            ));
        }

        if reranker.provider != "none" && reranker.model.is_empty() {
            errors.push(ValidationError::new(
                "reranker.model",
                "Model name cannot be empty",
            ));
        }

        if reranker.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "reranker.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_profiles(config: &Config, errors: &mut Vec<ValidationError>) {
        for (name, overrides) in &config.profiles {
            if let Some(mode) = &overrides.embedding_mode {
                if !EMBEDDING_MODES.contains(&mode.as_str()) {
                    errors.push(ValidationError::new(
                        format!("profiles.{}.embedding_mode", name),
                        format!("Mode must be 'offline' or 'online', got '{}'", mode),
                    ));
                }
            }

            if let Some(model) = &overrides.embedding_model {
                if embedding_dimension(model).is_none() {
                    errors.push(ValidationError::new(
                        format!("profiles.{}.embedding_model", name),
                        format!("Unknown embedding model '{}'", model),
                    ));
                }
            }

            if let Some(provider) = &overrides.reranker_provider {
                if !RERANK_PROVIDERS.contains(&provider.as_str()) {
                    errors.push(ValidationError::new(
                        format!("profiles.{}.reranker_provider", name),
                        format!("Unknown reranker provider '{}'", provider),
                    ));
                }
            }
        }
    }
}
