//! Answer assembly over retrieved chunks
//!
//! The language model is a black box behind [`AnswerGenerator`]. This module
//! formats the retrieved context, computes confidence and builds citations.

use crate::retrieval::{Citation, SearchResult};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Phrases marking an answer that found nothing in the sources
pub const NOT_FOUND_PHRASES: &[&str] = &[
    "nicht enthalten",
    "keine information",
    "nicht gefunden",
    "kann ich nicht",
    "steht nicht",
    "not contained",
    "no information",
    "not found",
    "cannot find",
];

#[derive(Error, Debug)]
pub enum AnswerError {
    #[error("No relevant chunks found for question: {query}")]
    NoRelevantChunks { query: String },

    #[error("Answer generation failed: {0}")]
    Generation(String),
}

/// Text generator answering a question from formatted context
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String, AnswerError>;

    /// Answer as a sequence of text fragments.
    ///
    /// The default yields the complete answer as one fragment.
    fn generate_stream<'a>(
        &'a self,
        question: &'a str,
        context: &'a str,
    ) -> BoxStream<'a, Result<String, AnswerError>> {
        stream::once(self.generate(question, context)).boxed()
    }
}

/// Generated answer with its sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub doc_id: Option<String>,
    pub answer: String,
    /// Mean score of the results the answer was built from
    pub confidence: f32,
    pub citations: Vec<Citation>,
    pub result_count: usize,
}

/// One step of a streamed answer
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    Sources(Vec<Citation>),
    Delta(String),
    Done { confidence: f32 },
}

/// Render results as numbered source blocks
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[Source {} - Page {} - Relevance: {:.2}]\n{}\n",
                i + 1,
                r.chunk.page,
                r.score,
                r.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Mean score of `results`, 0 when empty
pub fn confidence(results: &[SearchResult]) -> f32 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(|r| r.score).sum::<f32>() / results.len() as f32
}

pub fn indicates_not_found(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    NOT_FOUND_PHRASES.iter().any(|p| lower.contains(p))
}

/// Builds answers from retrieval results with an [`AnswerGenerator`]
#[derive(Clone)]
pub struct AnswerAssembler {
    generator: Arc<dyn AnswerGenerator>,
}

impl AnswerAssembler {
    pub fn new(generator: Arc<dyn AnswerGenerator>) -> Self {
        Self { generator }
    }

    /// Answer `question` from `results`.
    ///
    /// An empty result list is [`AnswerError::NoRelevantChunks`]; the model
    /// is never asked to answer without sources.
    pub async fn answer(
        &self,
        question: &str,
        doc_id: Option<&str>,
        results: &[SearchResult],
    ) -> Result<Answer, AnswerError> {
        if results.is_empty() {
            return Err(AnswerError::NoRelevantChunks {
                query: question.to_string(),
            });
        }

        let context = format_context(results);
        let answer = self.generator.generate(question, &context).await?;

        let citations = if indicates_not_found(&answer) {
            tracing::debug!("Answer reports missing information, dropping citations");
            Vec::new()
        } else {
            results.iter().map(SearchResult::to_citation).collect()
        };

        let confidence = confidence(results);
        tracing::info!(
            "Answered from {} sources (confidence {:.2})",
            results.len(),
            confidence
        );

        Ok(Answer {
            question: question.to_string(),
            doc_id: doc_id.map(str::to_string),
            answer,
            confidence,
            citations,
            result_count: results.len(),
        })
    }

    /// Stream the answer: sources first, then text fragments, then `Done`.
    ///
    /// Dropping the stream stops generation.
    pub fn stream(
        &self,
        question: &str,
        results: Vec<SearchResult>,
    ) -> Result<BoxStream<'static, Result<AnswerEvent, AnswerError>>, AnswerError> {
        if results.is_empty() {
            return Err(AnswerError::NoRelevantChunks {
                query: question.to_string(),
            });
        }

        let generator = Arc::clone(&self.generator);
        let question = question.to_string();

        let events = async_stream::try_stream! {
            let context = format_context(&results);
            yield AnswerEvent::Sources(results.iter().map(SearchResult::to_citation).collect());

            let mut fragments = generator.generate_stream(&question, &context);
            while let Some(fragment) = fragments.next().await {
                yield AnswerEvent::Delta(fragment?);
            }

            yield AnswerEvent::Done { confidence: confidence(&results) };
        };

        Ok(events.boxed())
    }
}
