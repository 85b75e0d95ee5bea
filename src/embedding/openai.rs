/// HTTP client for OpenAI-compatible embedding services
use super::provider::{check_vectors, embedding_dimension, EmbeddingError, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Embedding provider backed by the `/embeddings` endpoint.
///
/// Every call to [`EmbeddingProvider::embed`] is one POST carrying all inputs.
pub struct OpenAiEmbedder {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// Build from configuration, reading the API key from `api_key_env`
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            EmbeddingError::Initialization(format!(
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
    ) -> Result<Self, EmbeddingError> {
        let dimension = embedding_dimension(model).ok_or_else(|| {
            EmbeddingError::Initialization(format!("Unknown embedding model: {}", model))
        })?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::Initialization(e.to_string()))?;

        tracing::info!(
            "Initialized embedding client: {} ({}D) at {}",
            model,
            dimension,
            api_base
        );

        Ok(Self {
            http,
            endpoint: format!("{}/embeddings", api_base.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if texts.iter().any(|t| t.is_empty()) {
            return Err(EmbeddingError::InvalidInput(
                "Cannot embed empty text".to_string(),
            ));
        }

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Transport(format!("request timed out: {}", e))
                } else {
                    EmbeddingError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(EmbeddingError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        parsed.data.sort_by_key(|item| item.index);
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|i| i.embedding).collect();

        check_vectors(&vectors, texts.len(), self.dimension)?;

        tracing::debug!("Embedded {} texts with {}", texts.len(), self.model);

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
