/// Batched embedding for large chunk sets
use super::{EmbeddingError, EmbeddingProvider};
use tracing::debug;

/// Embed `texts` in upstream calls of at most `batch_size` inputs.
///
/// Output order matches input order. The first failing batch aborts the
/// whole operation.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let start = std::time::Instant::now();
    let batch_size = batch_size.max(1);
    let mut vectors = Vec::with_capacity(texts.len());

    for (i, batch) in texts.chunks(batch_size).enumerate() {
        let embedded = provider.embed(batch).await?;
        if embedded.len() != batch.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: batch.len(),
                actual: embedded.len(),
            });
        }
        debug!("Embedded batch {} ({} texts)", i + 1, batch.len());
        vectors.extend(embedded);
    }

    debug!(
        "Embedded {} texts with {} in {}ms",
        texts.len(),
        provider.model_name(),
        start.elapsed().as_millis()
    );

    Ok(vectors)
}
