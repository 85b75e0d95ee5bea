//! Cross-encoder reranking: hosted (Cohere) or local (FastEmbed)

use crate::config::RerankerConfig;
use async_trait::async_trait;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Rerank request failed: {0}")]
    Transport(String),

    #[error("Rerank service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid rerank response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Relevance of one candidate, by position in the submitted list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankHit {
    pub index: usize,
    pub score: f32,
}

/// Query-conditioned relevance scoring over a candidate set
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score `documents` against `query`, returning at most `top_n` hits
    /// sorted by relevance descending
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, RerankError>;

    fn model_name(&self) -> &str;
}

/// Build the reranker named by `config.provider`; `none` yields `None`
pub fn reranker_from_config(
    config: &RerankerConfig,
) -> Result<Option<Arc<dyn Reranker>>, RerankError> {
    match config.provider.as_str() {
        "none" => Ok(None),
        "cohere" => Ok(Some(Arc::new(CohereReranker::new(config)?))),
        "local" => Ok(Some(Arc::new(FastEmbedReranker::new(&config.model)?))),
        other => Err(RerankError::InitializationError(format!(
            "Unknown reranker provider '{}'. Use 'cohere', 'local' or 'none'",
            other
        ))),
    }
}

fn sort_hits(hits: &mut Vec<RerankHit>, top_n: usize) {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_n);
}

#[derive(Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct CohereResponse {
    results: Vec<CohereResult>,
}

#[derive(Deserialize)]
struct CohereResult {
    index: usize,
    relevance_score: f32,
}

/// Reranker backed by the Cohere `/rerank` endpoint
pub struct CohereReranker {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl CohereReranker {
    pub fn new(config: &RerankerConfig) -> Result<Self, RerankError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RerankError::InitializationError(format!(
                "Environment variable {} is not set",
                config.api_key_env
            ))
        })?;

        Self::with_api_key(
            &config.api_base,
            api_key,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn with_api_key(
        api_base: &str,
        api_key: String,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, RerankError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        tracing::info!("Initialized rerank client: {} at {}", model, api_base);

        Ok(Self {
            http,
            endpoint: format!("{}/rerank", api_base.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Reranker for CohereReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, RerankError> {
        if documents.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        if query.trim().is_empty() {
            return Err(RerankError::InvalidInput("Query cannot be empty".to_string()));
        }

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&CohereRequest {
                model: &self.model,
                query,
                documents,
                top_n: top_n.min(documents.len()),
            })
            .send()
            .await
            .map_err(|e| RerankError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RerankError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CohereResponse = response
            .json()
            .await
            .map_err(|e| RerankError::InvalidResponse(e.to_string()))?;

        let mut hits: Vec<RerankHit> = parsed
            .results
            .into_iter()
            .map(|r| RerankHit {
                index: r.index,
                score: r.relevance_score,
            })
            .collect();
        sort_hits(&mut hits, top_n);

        tracing::debug!("Reranked {} documents with {}", documents.len(), self.model);

        Ok(hits)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Local cross-encoder reranker
pub struct FastEmbedReranker {
    model: Arc<TextRerank>,
    model_name: String,
}

impl FastEmbedReranker {
    /// Create a new reranker with specified model
    ///
    /// # Arguments
    /// * `model_name` - "BAAI/bge-reranker-base" or "rozgo/bge-reranker-v2-m3"
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        let model = match model_name {
            "BAAI/bge-reranker-base" | "bge-reranker-base" => RerankerModel::BGERerankerBase,
            "rozgo/bge-reranker-v2-m3" | "bge-reranker-v2-m3" => RerankerModel::BGERerankerV2M3,
            other => {
                return Err(RerankError::InitializationError(format!(
                    "Unsupported local reranker: {}",
                    other
                )))
            }
        };

        tracing::info!("Initializing reranker model: {}", model_name);

        let init_options = RerankInitOptions::new(model).with_show_download_progress(true);
        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
        })
    }
}

#[async_trait]
impl Reranker for FastEmbedReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, RerankError> {
        if documents.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        if query.trim().is_empty() {
            return Err(RerankError::InvalidInput("Query cannot be empty".to_string()));
        }

        let model = Arc::clone(&self.model);
        let query = query.to_string();
        let documents = documents.to_vec();

        let results = tokio::task::spawn_blocking(move || {
            let docs: Vec<&str> = documents.iter().map(|s| s.as_str()).collect();
            model.rerank(query.as_str(), docs, false, None)
        })
        .await
        .map_err(|e| RerankError::Transport(format!("rerank task failed: {}", e)))?
        .map_err(|e| RerankError::Transport(e.to_string()))?;

        let mut hits: Vec<RerankHit> = results
            .into_iter()
            .map(|r| RerankHit {
                index: r.index,
                score: r.score,
            })
            .collect();
        sort_hits(&mut hits, top_n);

        Ok(hits)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
