/// BPE token counting for chunk sizing
use super::ChunkError;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Encodings accepted by `chunking.encoding`
pub const SUPPORTED_ENCODINGS: &[&str] = &["cl100k_base", "o200k_base", "p50k_base", "r50k_base"];

pub fn is_supported_encoding(name: &str) -> bool {
    SUPPORTED_ENCODINGS.contains(&name)
}

/// Token counter wrapping a tiktoken encoding.
///
/// Cheap to clone; the BPE tables are shared.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
    encoding: String,
}

impl TokenCounter {
    /// Load the named encoding (e.g. "cl100k_base")
    pub fn new(encoding: &str) -> Result<Self, ChunkError> {
        let bpe = match encoding {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            other => {
                return Err(ChunkError::UnknownEncoding {
                    name: other.to_string(),
                    available: SUPPORTED_ENCODINGS.join(", "),
                })
            }
        }
        .map_err(|e| ChunkError::Tokenizer(e.to_string()))?;

        tracing::debug!("Loaded tokenizer encoding {}", encoding);

        Ok(Self {
            bpe: Arc::new(bpe),
            encoding: encoding.to_string(),
        })
    }

    /// Count tokens in `text`, ignoring special tokens
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}
