//! Weighted score fusion of BM25 and semantic rankings

use super::SearchResult;
use crate::chunking::TextChunk;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid BM25 weight {0}: must lie in [0, 1]")]
    InvalidWeight(f32),
}

/// Configuration for fusion algorithm
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    /// Weight of the normalized BM25 score; the semantic score gets the rest
    pub bm25_weight: f32,
}

impl FusionConfig {
    pub fn new(bm25_weight: f32) -> Result<Self, FusionError> {
        if !bm25_weight.is_finite() || !(0.0..=1.0).contains(&bm25_weight) {
            return Err(FusionError::InvalidWeight(bm25_weight));
        }

        Ok(Self { bm25_weight })
    }

    pub fn semantic_weight(&self) -> f32 {
        1.0 - self.bm25_weight
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { bm25_weight: 0.5 }
    }
}

/// Divide every score by the batch maximum.
///
/// If the maximum is not positive (no term overlap anywhere) the scores are
/// returned unchanged.
pub fn normalize_by_max(scores: &HashMap<String, f32>) -> HashMap<String, f32> {
    let max = scores.values().copied().fold(0.0_f32, f32::max);
    if max <= 0.0 {
        return scores.clone();
    }

    scores
        .iter()
        .map(|(id, score)| (id.clone(), score / max))
        .collect()
}

/// Fuse scores over every chunk of a document.
///
/// `combined = w * bm25 + (1 - w) * semantic`, with a chunk missing from
/// either map scoring 0 on that side. Output is sorted descending; ties keep
/// the order of `chunks`.
pub fn weighted_fusion(
    chunks: &[TextChunk],
    semantic: &HashMap<String, f32>,
    bm25_normalized: &HashMap<String, f32>,
    config: &FusionConfig,
) -> Vec<SearchResult> {
    let w = config.bm25_weight;

    let mut fused: Vec<SearchResult> = chunks
        .iter()
        .map(|chunk| {
            let bm25 = bm25_normalized.get(&chunk.id).copied().unwrap_or(0.0);
            let sem = semantic.get(&chunk.id).copied().unwrap_or(0.0);
            // min() absorbs rounding above 1
            let combined = (w * bm25 + (1.0 - w) * sem).min(1.0);
            SearchResult::new(chunk.clone(), combined)
        })
        .collect();

    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused
}
