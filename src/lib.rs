//! lensrag - Retrieval pipeline for document question answering
//!
//! Splits extracted page text into token-bounded chunks, embeds them into a
//! per-document vector collection, and retrieves ranked chunks with semantic,
//! hybrid BM25 + semantic, or reranked strategies before answer assembly.

pub mod agent;
pub mod answer;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod retrieval;

pub use error::{LensError, Result};
