//! Concurrency-limited embedder wrapper and the per-document driver.

use ragline_core::{
    EmbedError, EmbedReport, EmbedStats, Embedder, EmbeddingOutput, Result,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Wraps an [`Embedder`] with a concurrency cap and drives multi-batch
/// document embedding.
///
/// The semaphore bounds in-flight service calls across all documents.
/// Batches within one document run sequentially so a permanent failure
/// stops the document without wasting calls on the remainder.
pub struct EmbedderPool {
    embedder: Arc<dyn Embedder>,
    permits: Arc<Semaphore>,
    batch_size: usize,
}

impl EmbedderPool {
    /// Create a pool over `embedder` allowing `max_concurrent` in-flight
    /// service calls and splitting document inputs into batches of
    /// `batch_size`.
    pub fn new(embedder: Arc<dyn Embedder>, max_concurrent: usize, batch_size: usize) -> Self {
        Self {
            embedder,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            batch_size: batch_size.max(1),
        }
    }

    /// The wrapped embedder's vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// The wrapped embedder's model identifier.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Embed a single query string under a concurrency permit.
    pub async fn embed_query(&self, query: &str) -> Result<EmbeddingOutput> {
        let _permit = self.acquire().await?;
        Ok(self.embedder.embed_query(query).await?)
    }

    /// Embed all of a document's chunk texts, batch by batch.
    ///
    /// Never returns `Err`: a permanent batch failure ends the run early,
    /// counts the unembedded remainder as failed, and records the cause in
    /// the report. Callers mark the document failed from the report.
    pub async fn embed_document(&self, texts: &[&str]) -> Result<EmbedReport> {
        let mut outputs = Vec::with_capacity(texts.len());
        let mut stats = EmbedStats::default();
        let mut failure = None;

        for batch in texts.chunks(self.batch_size) {
            let _permit = self.acquire().await?;
            match self.embedder.embed_batch(batch).await {
                Ok(result) => {
                    stats.succeeded += result.outputs.len();
                    stats.retries += result.retries;
                    outputs.extend(result.outputs);
                    debug!(
                        embedded = stats.succeeded,
                        total = texts.len(),
                        "embedded batch"
                    );
                }
                Err(err) => {
                    if let EmbedError::RetriesExhausted { attempts, .. } = &err {
                        stats.retries += attempts.saturating_sub(1) as usize;
                    }
                    stats.failed = texts.len() - stats.succeeded;
                    warn!(error = %err, failed = stats.failed, "embedding run aborted");
                    failure = Some(err);
                    break;
                }
            }
        }

        Ok(EmbedReport { outputs, stats, failure })
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| EmbedError::Transport("embedder pool closed".to_string()).into())
    }
}
