//! Deterministic offline embedder for tests and dry runs.

use async_trait::async_trait;
use ragline_core::{estimate_tokens, EmbedBatch, EmbedError, Embedder, EmbeddingOutput};

/// Embedder that derives vectors from a content hash instead of
/// calling a service.
///
/// The same text always produces the same vector, so similarity search
/// over noop embeddings is stable across runs. Useful for pipeline
/// tests and offline smoke runs.
pub struct NoopEmbedder {
    dimension: usize,
}

impl NoopEmbedder {
    /// Create a noop embedder with the default dimension.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimension(384)
    }

    /// Create a noop embedder producing vectors of `dimension`.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let hash = blake3::hash(text.as_bytes());
        let bytes = hash.as_bytes();
        (0..self.dimension)
            .map(|i| (bytes[i % 32] as f32 / 255.0) - 0.5)
            .collect()
    }
}

impl Default for NoopEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for NoopEmbedder {
    fn model_name(&self) -> &str {
        "noop"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_input_tokens(&self) -> usize {
        usize::MAX
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<EmbedBatch, EmbedError> {
        let outputs = texts
            .iter()
            .map(|text| EmbeddingOutput {
                embedding: self.vector_for(text),
                token_count: estimate_tokens(text),
                truncated: false,
            })
            .collect();
        Ok(EmbedBatch { outputs, retries: 0 })
    }
}
