use providers::{EmbeddingProvider, ProviderError};

/// Embeds `texts` in batches of at most `batch_size`, returning one vector
/// per input text in input order.
pub async fn embed_batched(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let resp = provider.embed(batch).await?;
        if resp.vectors.len() != batch.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "embedding provider returned {} vectors for {} texts",
                resp.vectors.len(),
                batch.len()
            )));
        }
        vectors.extend(resp.vectors);
    }
    Ok(vectors)
}
