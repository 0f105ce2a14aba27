//! Document ingestion pipeline.
//!
//! [`PipelineService`] drives a document through extract → chunk →
//! embed → index, recording every status transition on the registry
//! record and broadcasting lifecycle events. Stage failures land the
//! document in `failed` with the cause; a cancel request observed
//! between stages lands it in `cancelled`.

use ragline_core::{
    Chunk, ChunkConfig, Chunker, Document, DocumentFormat, DocumentStatus, Embedding, Error,
    IndexEntry, Result, VectorIndex,
};
use ragline_embed::EmbedderPool;
use ragline_extract::ExtractorRegistry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pipeline lifecycle events.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A document finished an intermediate stage.
    StageCompleted {
        document_id: Uuid,
        status: DocumentStatus,
    },
    /// A document's chunks and vectors are searchable.
    DocumentIndexed {
        document_id: Uuid,
        chunk_count: u32,
    },
    /// A stage failed and the document will not be retried.
    DocumentFailed { document_id: Uuid, error: String },
    /// Processing stopped at a stage boundary on request.
    DocumentCancelled { document_id: Uuid },
}

/// Orchestrates the document ingestion pipeline.
pub struct PipelineService {
    extractors: Arc<ExtractorRegistry>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<EmbedderPool>,
    index: Arc<dyn VectorIndex>,
    registry: Arc<crate::DocumentRegistry>,
    chunk_config: ChunkConfig,
    event_tx: broadcast::Sender<PipelineEvent>,
    cancel_flags: RwLock<HashMap<Uuid, Arc<AtomicBool>>>,
}

impl PipelineService {
    /// Create a pipeline over the given stage implementations.
    pub fn new(
        extractors: Arc<ExtractorRegistry>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<EmbedderPool>,
        index: Arc<dyn VectorIndex>,
        registry: Arc<crate::DocumentRegistry>,
        chunk_config: ChunkConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            extractors,
            chunker,
            embedder,
            index,
            registry,
            chunk_config,
            event_tx,
            cancel_flags: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to pipeline lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.event_tx.subscribe()
    }

    /// The registry holding document records.
    #[must_use]
    pub fn registry(&self) -> &crate::DocumentRegistry {
        &self.registry
    }

    /// Ingest a document and process it to a terminal status.
    ///
    /// Returns the document record; its status tells whether processing
    /// ended `indexed`, `failed`, or `cancelled`. Re-ingesting bytes an
    /// owner already has indexed returns the existing record without
    /// reprocessing.
    pub async fn ingest_document(
        &self,
        owner_id: &str,
        name: &str,
        format: DocumentFormat,
        bytes: &[u8],
    ) -> Result<Document> {
        self.chunk_config.validate().map_err(Error::from)?;

        let content_hash = blake3::hash(bytes).to_hex().to_string();
        if let Some(existing) = self.registry.find_by_hash(owner_id, &content_hash).await {
            if existing.status == DocumentStatus::Indexed {
                debug!(document_id = %existing.id, owner = owner_id, "content already indexed, skipping");
                return Ok(existing);
            }
        }

        let document = Document::new(owner_id, name, format, bytes.len() as u64, content_hash);
        let document_id = document.id;
        info!(%document_id, owner = owner_id, name, %format, size = bytes.len(), "ingesting document");
        self.registry.upsert(document).await;

        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_flags
            .write()
            .await
            .insert(document_id, cancel.clone());

        let result = self.process(document_id, owner_id, bytes, &cancel).await;
        self.cancel_flags.write().await.remove(&document_id);
        result
    }

    /// Request cancellation of an in-flight document.
    ///
    /// Takes effect at the next stage boundary. Returns false when the
    /// document is not currently processing.
    pub async fn cancel(&self, document_id: Uuid) -> bool {
        let flags = self.cancel_flags.read().await;
        match flags.get(&document_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Fetch one of an owner's documents.
    pub async fn document(&self, owner_id: &str, document_id: Uuid) -> Result<Document> {
        self.registry
            .get(owner_id, document_id)
            .await
            .ok_or(Error::DocumentNotFound(document_id))
    }

    /// List an owner's documents, oldest first.
    pub async fn list_documents(&self, owner_id: &str) -> Vec<Document> {
        self.registry.list(owner_id).await
    }

    /// Delete a document: its index entries and its registry record.
    pub async fn delete_document(&self, owner_id: &str, document_id: Uuid) -> Result<Document> {
        let document = self.document(owner_id, document_id).await?;
        let removed = self.index.remove_document(owner_id, document_id).await?;
        self.registry.remove(owner_id, document_id).await;
        info!(%document_id, owner = owner_id, entries = removed, "deleted document");
        Ok(document)
    }

    /// Persist an owner's index partition.
    pub async fn save_index(&self, owner_id: &str) -> Result<()> {
        self.index.save(owner_id).await?;
        Ok(())
    }

    async fn process(
        &self,
        document_id: Uuid,
        owner_id: &str,
        bytes: &[u8],
        cancel: &AtomicBool,
    ) -> Result<Document> {
        let Some(document) = self.registry.get(owner_id, document_id).await else {
            return Err(Error::DocumentNotFound(document_id));
        };

        // extract
        let extracted = match self.extractors.extract(document.format, bytes).await {
            Ok(extracted) => extracted,
            Err(err) => return self.fail(document_id, err.to_string()).await,
        };
        debug!(%document_id, words = extracted.info.word_count, "extracted text");
        self.transition(document_id, DocumentStatus::Extracted).await;
        if cancel.load(Ordering::SeqCst) {
            return self.cancelled(document_id).await;
        }

        // chunk
        let pieces = match self.chunker.split(&extracted.text, &self.chunk_config).await {
            Ok(pieces) => pieces,
            Err(err) => return self.fail(document_id, err.to_string()).await,
        };
        if pieces.is_empty() {
            return self
                .fail(document_id, "extraction produced no indexable text".to_string())
                .await;
        }
        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| Chunk::from_piece(document_id, i as u32, piece))
            .collect();
        let chunk_count = chunks.len() as u32;
        self.registry
            .update(document_id, |doc| {
                doc.status = DocumentStatus::Chunked;
                doc.chunk_count = chunk_count;
            })
            .await;
        let _ = self.event_tx.send(PipelineEvent::StageCompleted {
            document_id,
            status: DocumentStatus::Chunked,
        });
        debug!(%document_id, chunks = chunk_count, "chunked document");
        if cancel.load(Ordering::SeqCst) {
            return self.cancelled(document_id).await;
        }

        // embed
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.content.as_str()).collect();
        let report = self.embedder.embed_document(&texts).await?;
        info!(
            %document_id,
            succeeded = report.stats.succeeded,
            failed = report.stats.failed,
            retries = report.stats.retries,
            "embedding finished"
        );
        if !report.is_complete() {
            let stats = report.stats;
            let cause = report
                .failure
                .map_or_else(|| "embedding incomplete".to_string(), |err| err.to_string());
            // keep the partial progress visible in the recorded error
            let detail = format!(
                "{cause} ({} of {} chunks embedded)",
                stats.succeeded,
                stats.succeeded + stats.failed
            );
            return self.fail(document_id, detail).await;
        }
        self.transition(document_id, DocumentStatus::Embedded).await;
        if cancel.load(Ordering::SeqCst) {
            return self.cancelled(document_id).await;
        }

        // index
        let model = self.embedder.model_name().to_string();
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(report.outputs)
            .map(|(chunk, output)| IndexEntry {
                embedding: Embedding {
                    chunk_id: chunk.id,
                    vector: output.embedding,
                    model: model.clone(),
                },
                chunk,
            })
            .collect();
        if let Err(err) = self.index.append(owner_id, entries).await {
            return self.fail(document_id, err.to_string()).await;
        }

        let updated = self
            .registry
            .update(document_id, |doc| doc.status = DocumentStatus::Indexed)
            .await
            .ok_or(Error::DocumentNotFound(document_id))?;
        let _ = self.event_tx.send(PipelineEvent::DocumentIndexed {
            document_id,
            chunk_count,
        });
        info!(%document_id, chunks = chunk_count, "document indexed");
        Ok(updated)
    }

    async fn transition(&self, document_id: Uuid, status: DocumentStatus) {
        self.registry
            .update(document_id, |doc| doc.status = status)
            .await;
        let _ = self.event_tx.send(PipelineEvent::StageCompleted {
            document_id,
            status,
        });
    }

    async fn fail(&self, document_id: Uuid, error: String) -> Result<Document> {
        warn!(%document_id, error, "document failed");
        let updated = self
            .registry
            .update(document_id, |doc| {
                doc.status = DocumentStatus::Failed;
                doc.error = Some(error.clone());
            })
            .await
            .ok_or(Error::DocumentNotFound(document_id))?;
        let _ = self
            .event_tx
            .send(PipelineEvent::DocumentFailed { document_id, error });
        Ok(updated)
    }

    async fn cancelled(&self, document_id: Uuid) -> Result<Document> {
        info!(%document_id, "document cancelled");
        let updated = self
            .registry
            .update(document_id, |doc| doc.status = DocumentStatus::Cancelled)
            .await
            .ok_or(Error::DocumentNotFound(document_id))?;
        let _ = self
            .event_tx
            .send(PipelineEvent::DocumentCancelled { document_id });
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentRegistry;
    use async_trait::async_trait;
    use ragline_chunker::RecursiveChunker;
    use ragline_core::{EmbedBatch, EmbedError, Embedder, EmbeddingOutput};
    use ragline_embed::NoopEmbedder;
    use ragline_store::FlatIndex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn service_with_embedder(embedder: Arc<dyn Embedder>) -> (PipelineService, Arc<FlatIndex>) {
        let dimension = embedder.dimension();
        let index = Arc::new(FlatIndex::new(dimension));
        let service = PipelineService::new(
            Arc::new(ExtractorRegistry::with_defaults()),
            Arc::new(RecursiveChunker::new()),
            Arc::new(EmbedderPool::new(embedder, 4, 100)),
            index.clone(),
            Arc::new(DocumentRegistry::new()),
            ChunkConfig { size: 50, overlap: 10 },
        );
        (service, index)
    }

    fn service() -> (PipelineService, Arc<FlatIndex>) {
        service_with_embedder(Arc::new(NoopEmbedder::with_dimension(8)))
    }

    #[tokio::test]
    async fn ingest_runs_to_indexed() {
        let (service, index) = service();
        let text = "Alpha paragraph with some words.\n\nBeta paragraph with more words.";
        let doc = service
            .ingest_document("owner-a", "notes.txt", DocumentFormat::PlainText, text.as_bytes())
            .await
            .unwrap();

        assert_eq!(doc.status, DocumentStatus::Indexed);
        assert!(doc.chunk_count >= 1);
        assert!(doc.error.is_none());

        let stats = index.stats("owner-a").await.unwrap();
        assert_eq!(stats.total_vectors, doc.chunk_count as usize);
        assert_eq!(stats.total_documents, 1);
    }

    #[tokio::test]
    async fn reingesting_identical_bytes_is_idempotent() {
        let (service, index) = service();
        let bytes = b"Same content both times, word for word.";

        let first = service
            .ingest_document("o", "a.txt", DocumentFormat::PlainText, bytes)
            .await
            .unwrap();
        let vectors_after_first = index.stats("o").await.unwrap().total_vectors;

        let second = service
            .ingest_document("o", "a-again.txt", DocumentFormat::PlainText, bytes)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(index.stats("o").await.unwrap().total_vectors, vectors_after_first);
        assert_eq!(service.list_documents("o").await.len(), 1);
    }

    #[tokio::test]
    async fn empty_payload_fails_without_indexing() {
        let (service, index) = service();
        let doc = service
            .ingest_document("o", "empty.txt", DocumentFormat::PlainText, b"   \n  ")
            .await
            .unwrap();

        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.error.is_some());
        assert_eq!(index.stats("o").await.unwrap().total_vectors, 0);
    }

    #[tokio::test]
    async fn oversized_payload_fails_before_extraction() {
        let index = Arc::new(FlatIndex::new(8));
        let service = PipelineService::new(
            Arc::new(ExtractorRegistry::with_defaults().with_max_bytes(16)),
            Arc::new(RecursiveChunker::new()),
            Arc::new(EmbedderPool::new(Arc::new(NoopEmbedder::with_dimension(8)), 4, 100)),
            index,
            Arc::new(DocumentRegistry::new()),
            ChunkConfig::default(),
        );

        let doc = service
            .ingest_document("o", "big.txt", DocumentFormat::PlainText, &[b'x'; 64])
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.error.unwrap().contains("exceeds"));
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dimension(&self) -> usize {
            8
        }
        fn max_input_tokens(&self) -> usize {
            usize::MAX
        }
        async fn embed_batch(&self, _texts: &[&str]) -> std::result::Result<EmbedBatch, EmbedError> {
            Err(EmbedError::RetriesExhausted {
                attempts: 3,
                message: "service down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn embedding_failure_marks_document_failed() {
        let (service, index) = service_with_embedder(Arc::new(FailingEmbedder));
        let doc = service
            .ingest_document("o", "doc.txt", DocumentFormat::PlainText, b"Some real content here.")
            .await
            .unwrap();

        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.error.unwrap().contains("service down"));
        assert_eq!(index.stats("o").await.unwrap().total_vectors, 0);
    }

    /// Embeds the first batch, then fails permanently.
    struct FirstBatchEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FirstBatchEmbedder {
        fn model_name(&self) -> &str {
            "first-batch"
        }
        fn dimension(&self) -> usize {
            8
        }
        fn max_input_tokens(&self) -> usize {
            usize::MAX
        }
        async fn embed_batch(&self, texts: &[&str]) -> std::result::Result<EmbedBatch, EmbedError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                return Err(EmbedError::RetriesExhausted {
                    attempts: 3,
                    message: "rate limited".to_string(),
                });
            }
            Ok(EmbedBatch {
                outputs: texts
                    .iter()
                    .map(|_| EmbeddingOutput {
                        embedding: vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                        token_count: 1,
                        truncated: false,
                    })
                    .collect(),
                retries: 0,
            })
        }
    }

    #[tokio::test]
    async fn partial_embedding_failure_records_progress_counts() {
        // four 40-char paragraphs chunk into four pieces; batch size 2
        // makes the first batch succeed and the second fail
        let text: String = (0..4)
            .map(|i| format!("{i:0>40}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let index = Arc::new(FlatIndex::new(8));
        let service = PipelineService::new(
            Arc::new(ExtractorRegistry::with_defaults()),
            Arc::new(RecursiveChunker::new()),
            Arc::new(EmbedderPool::new(
                Arc::new(FirstBatchEmbedder { calls: AtomicUsize::new(0) }),
                4,
                2,
            )),
            index.clone(),
            Arc::new(DocumentRegistry::new()),
            ChunkConfig { size: 15, overlap: 0 },
        );

        let doc = service
            .ingest_document("o", "doc.txt", DocumentFormat::PlainText, text.as_bytes())
            .await
            .unwrap();

        assert_eq!(doc.status, DocumentStatus::Failed);
        let error = doc.error.unwrap();
        assert!(error.contains("rate limited"));
        assert!(error.contains("2 of 4 chunks embedded"));
        assert_eq!(index.stats("o").await.unwrap().total_vectors, 0);
    }

    #[tokio::test]
    async fn delete_document_clears_index_and_record() {
        let (service, index) = service();
        let doc = service
            .ingest_document("o", "doc.txt", DocumentFormat::PlainText, b"Content to delete later.")
            .await
            .unwrap();

        service.delete_document("o", doc.id).await.unwrap();
        assert_eq!(index.stats("o").await.unwrap().total_vectors, 0);
        assert!(matches!(
            service.document("o", doc.id).await,
            Err(Error::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_unknown_document_is_not_found() {
        let (service, _) = service();
        assert!(matches!(
            service.delete_document("o", Uuid::new_v4()).await,
            Err(Error::DocumentNotFound(_))
        ));
    }

    /// Embedder that signals entry and waits for a release, so a test
    /// can cancel the document mid-flight.
    struct GatedEmbedder {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Embedder for GatedEmbedder {
        fn model_name(&self) -> &str {
            "gated"
        }
        fn dimension(&self) -> usize {
            4
        }
        fn max_input_tokens(&self) -> usize {
            usize::MAX
        }
        async fn embed_batch(&self, texts: &[&str]) -> std::result::Result<EmbedBatch, EmbedError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(EmbedBatch {
                outputs: texts
                    .iter()
                    .map(|_| EmbeddingOutput {
                        embedding: vec![1.0, 0.0, 0.0, 0.0],
                        token_count: 1,
                        truncated: false,
                    })
                    .collect(),
                retries: 0,
            })
        }
    }

    #[tokio::test]
    async fn cancel_between_stages_lands_in_cancelled() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let embedder = Arc::new(GatedEmbedder {
            entered: entered.clone(),
            release: release.clone(),
        });
        let (service, index) = service_with_embedder(embedder);
        let service = Arc::new(service);

        let task = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .ingest_document("o", "doc.txt", DocumentFormat::PlainText, b"Cancel me please.")
                    .await
            })
        };

        // wait for the embed stage, then request cancellation
        entered.notified().await;
        let in_flight = service.list_documents("o").await;
        assert_eq!(in_flight.len(), 1);
        assert!(service.cancel(in_flight[0].id).await);
        release.notify_one();

        let doc = task.await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Cancelled);
        assert_eq!(index.stats("o").await.unwrap().total_vectors, 0);
    }

    #[tokio::test]
    async fn cancel_unknown_document_returns_false() {
        let (service, _) = service();
        assert!(!service.cancel(Uuid::new_v4()).await);
    }
}
