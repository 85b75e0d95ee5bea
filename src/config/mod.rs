//! Configuration management for lensrag
//!
//! Configuration is a TOML file with one section per pipeline stage, optional
//! named profiles, and `LENSRAG_<SECTION>__<KEY>` environment overrides.

use crate::chunking::ChunkingStrategy;
use crate::error::{LensError, Result};
use crate::retrieval::RetrievalStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

mod validator;

pub use validator::ConfigValidator;

/// Prefix of environment variables that override configuration values
pub const ENV_PREFIX: &str = "LENSRAG_";

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub retrieval: RetrievalConfig,
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub strategy: ChunkingStrategy,
    /// tiktoken encoding used to count tokens
    pub encoding: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::SizeBased,
            encoding: "cl100k_base".to_string(),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub mode: String, // "online" or "offline"
    pub model: String,
    pub api_base: String,
    pub api_key_env: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: "online".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            batch_size: 100,
            timeout_secs: 30,
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Collection name is this prefix followed by the document id
    pub collection_prefix: String,
    /// Result limit when a caller gives none
    pub max_results: usize,
    /// Minimum cosine similarity of a returned result
    pub similarity_threshold: f32,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            collection_prefix: "policy_".to_string(),
            max_results: 5,
            similarity_threshold: 0.3,
        }
    }
}

/// Retrieval strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub default_strategy: RetrievalStrategy,
    /// Hybrid fetches `limit * semantic_overfetch` semantic candidates
    pub semantic_overfetch: usize,
    pub bm25_weight: f32,
    /// Semantic candidates handed to the reranker
    pub rerank_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_strategy: RetrievalStrategy::Semantic,
            semantic_overfetch: 2,
            bm25_weight: 0.5,
            rerank_top_k: 10,
        }
    }
}

/// Reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub provider: String, // "cohere", "local" or "none"
    pub model: String,
    pub api_base: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            provider: "cohere".to_string(),
            model: "rerank-v3.5".to_string(),
            api_base: "https://api.cohere.com/v2".to_string(),
            api_key_env: "COHERE_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunking_strategy: Option<ChunkingStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_strategy: Option<RetrievalStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranker_provider: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LensError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| LensError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| LensError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Defaults with env overrides, used when no config file exists.
    ///
    /// A requested profile must exist, exactly as with a loaded file.
    pub fn defaults_with_profile(profile: Option<&str>) -> Result<Self> {
        Self::defaults_from(std::env::vars(), profile)
    }

    fn defaults_from<I>(vars: I, profile: Option<&str>) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Config::default();
        config.apply_overrides(vars);
        if let Some(profile) = profile {
            config.apply_profile(profile)?;
        }
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self.profiles.get(profile).cloned().ok_or_else(|| {
            LensError::Config(format!("Unknown profile '{}'", profile))
        })?;

        if let Some(strategy) = overrides.chunking_strategy {
            self.chunking.strategy = strategy;
        }
        if let Some(mode) = overrides.embedding_mode {
            self.embedding.mode = mode;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(strategy) = overrides.retrieval_strategy {
            self.retrieval.default_strategy = strategy;
        }
        if let Some(provider) = overrides.reranker_provider {
            self.reranker.provider = provider;
        }

        tracing::debug!("Applied profile {}", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: LENSRAG_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `LENSRAG_`-prefixed overrides from `vars`; others are ignored
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "CHUNKING__STRATEGY" => self.chunking.strategy = parse_value(path, value)?,
            "CHUNKING__ENCODING" => self.chunking.encoding = value.to_string(),
            "EMBEDDING__MODE" => self.embedding.mode = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__API_BASE" => self.embedding.api_base = value.to_string(),
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_value(path, value)?,
            "EMBEDDING__TIMEOUT_SECS" => self.embedding.timeout_secs = parse_value(path, value)?,
            "VECTOR_STORE__COLLECTION_PREFIX" => {
                self.vector_store.collection_prefix = value.to_string()
            }
            "VECTOR_STORE__MAX_RESULTS" => {
                self.vector_store.max_results = parse_value(path, value)?
            }
            "VECTOR_STORE__SIMILARITY_THRESHOLD" => {
                self.vector_store.similarity_threshold = parse_value(path, value)?
            }
            "RETRIEVAL__DEFAULT_STRATEGY" => {
                self.retrieval.default_strategy = parse_value(path, value)?
            }
            "RETRIEVAL__SEMANTIC_OVERFETCH" => {
                self.retrieval.semantic_overfetch = parse_value(path, value)?
            }
            "RETRIEVAL__BM25_WEIGHT" => self.retrieval.bm25_weight = parse_value(path, value)?,
            "RETRIEVAL__RERANK_TOP_K" => self.retrieval.rerank_top_k = parse_value(path, value)?,
            "RERANKER__PROVIDER" => self.reranker.provider = value.to_string(),
            "RERANKER__MODEL" => self.reranker.model = value.to_string(),
            "RERANKER__API_BASE" => self.reranker.api_base = value.to_string(),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| LensError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("lensrag").join("config.toml"))
    }
}

fn parse_value<T>(path: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| LensError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}': {}", value, e),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            reranker: RerankerConfig::default(),
            profiles: HashMap::new(),
        }
    }
}
