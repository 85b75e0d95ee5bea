//! Deterministic in-process stand-ins for the external services
#![allow(dead_code)]

use async_trait::async_trait;
use lensrag::agent::{AgentError, GeneralAnswerer, QuestionClassifier, QuestionType, TopicCheck};
use lensrag::answer::{AnswerError, AnswerGenerator};
use lensrag::chunking::TextChunk;
use lensrag::embedding::{EmbeddingError, EmbeddingProvider};
use lensrag::retrieval::{RerankError, RerankHit, Reranker};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const VOCAB: &[&str] = &[
    "deductible",
    "dental",
    "hospital",
    "premium",
    "coverage",
    "glasses",
    "annual",
    "treatment",
];

/// Bag-of-words embedder: one axis per vocabulary word
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; VOCAB.len()];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            if let Some(i) = VOCAB.iter().position(|v| *v == word) {
                v[i] += 1.0;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        VOCAB.len()
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Embedder with a fixed vector per known text
pub struct FixtureEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl FixtureEmbedder {
    pub fn new(pairs: Vec<(&str, Vec<f32>)>) -> Self {
        let dimension = pairs.first().map(|(_, v)| v.len()).unwrap_or(0);
        Self {
            vectors: pairs
                .into_iter()
                .map(|(t, v)| (t.to_string(), v))
                .collect(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FixtureEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .ok_or_else(|| EmbeddingError::InvalidInput(format!("no fixture for '{}'", t)))
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "fixture"
    }
}

/// Embedder whose upstream always rejects the request
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Upstream {
            status: 429,
            message: "rate limit exceeded".to_string(),
        })
    }

    fn dimension(&self) -> usize {
        4
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Scores candidates by reverse position: the last candidate ranks first
pub struct ReverseReranker {
    pub seen: Mutex<Vec<usize>>,
}

impl ReverseReranker {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Reranker for ReverseReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, RerankError> {
        self.seen.lock().unwrap().push(documents.len());
        let n = documents.len() as f32;
        let mut hits: Vec<RerankHit> = (0..documents.len())
            .rev()
            .map(|index| RerankHit {
                index,
                score: (index as f32 + 1.0) / n,
            })
            .collect();
        hits.truncate(top_n);
        Ok(hits)
    }

    fn model_name(&self) -> &str {
        "reverse"
    }
}

/// Reranker whose service is down
pub struct FailingReranker;

#[async_trait]
impl Reranker for FailingReranker {
    async fn rerank(
        &self,
        _query: &str,
        _documents: &[String],
        _top_n: usize,
    ) -> Result<Vec<RerankHit>, RerankError> {
        Err(RerankError::Upstream {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Reranker returning a hit for a candidate that was never sent
pub struct OutOfRangeReranker;

#[async_trait]
impl Reranker for OutOfRangeReranker {
    async fn rerank(
        &self,
        _query: &str,
        _documents: &[String],
        _top_n: usize,
    ) -> Result<Vec<RerankHit>, RerankError> {
        Ok(vec![RerankHit {
            index: 99,
            score: 0.9,
        }])
    }

    fn model_name(&self) -> &str {
        "out-of-range"
    }
}

/// Generator that always returns the same text
pub struct StaticGenerator(pub &'static str);

#[async_trait]
impl AnswerGenerator for StaticGenerator {
    async fn generate(&self, _question: &str, context: &str) -> Result<String, AnswerError> {
        if context.is_empty() {
            return Err(AnswerError::Generation("empty context".to_string()));
        }
        Ok(self.0.to_string())
    }
}

pub struct StaticClassifier {
    pub topic: TopicCheck,
    pub kind: QuestionType,
    pub classify_calls: AtomicUsize,
}

impl StaticClassifier {
    pub fn new(topic: TopicCheck, kind: QuestionType) -> Self {
        Self {
            topic,
            kind,
            classify_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QuestionClassifier for StaticClassifier {
    async fn check_topic(&self, _question: &str) -> Result<TopicCheck, AgentError> {
        Ok(self.topic.clone())
    }

    async fn classify(&self, _question: &str) -> Result<QuestionType, AgentError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.kind)
    }
}

pub struct StaticGeneral(pub &'static str);

#[async_trait]
impl GeneralAnswerer for StaticGeneral {
    async fn answer(&self, _question: &str) -> Result<String, AgentError> {
        Ok(self.0.to_string())
    }
}

pub fn chunk(doc_id: &str, index: usize, text: &str) -> TextChunk {
    TextChunk {
        id: format!("{}_size_based_{}", doc_id, index),
        text: text.to_string(),
        page: index as u32 + 1,
        chunk_index: index,
        token_count: text.split_whitespace().count(),
        start_char: None,
        end_char: None,
    }
}

/// Five short policy clauses
pub fn policy_chunks(doc_id: &str) -> Vec<TextChunk> {
    [
        "The annual deductible is 500 EUR per insured person.",
        "Dental treatment is covered at 80 percent after the deductible.",
        "Hospital stays are covered in a shared room.",
        "Glasses are reimbursed up to 150 EUR every two years.",
        "The premium is adjusted annually based on age.",
    ]
    .iter()
    .enumerate()
    .map(|(i, text)| chunk(doc_id, i, text))
    .collect()
}
