//! Component seams for the ragline pipeline.
//!
//! Every pipeline stage is reached through one of these traits:
//!
//! - [`DocumentExtractor`]: raw bytes → plain text plus metadata
//! - [`Chunker`]: extracted text → ordered chunk pieces
//! - [`Embedder`]: chunk texts → fixed-dimension vectors
//! - [`VectorIndex`]: per-owner vector accumulation and search
//! - [`CompletionClient`]: final prompt → generated text
//!
//! Production and test implementations are swapped behind these seams
//! without touching the orchestration code.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{ChunkError, EmbedError, ExecuteError, ExtractError, IndexError};
use crate::types::{
    ChunkConfig, ChunkPiece, CompletionRequest, CompletionResponse, DocumentFormat, EmbedBatch,
    EmbeddingOutput, ExtractedText, IndexEntry, IndexStats, SearchQuery, SearchResult,
};

/// Converts a raw document payload into plain text plus metadata.
///
/// Extractors perform no persistence; they only transform bytes.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// The single format this extractor handles.
    fn format(&self) -> DocumentFormat;

    /// Extract plain text and structural metadata from raw bytes.
    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError>;
}

/// Splits extracted text into ordered, size-bounded pieces.
///
/// Implementations must be deterministic: identical (text, config) pairs
/// always yield identical piece sequences.
#[async_trait]
pub trait Chunker: Send + Sync {
    /// Name of this chunking strategy.
    fn name(&self) -> &str;

    /// Split text into pieces.
    async fn split(&self, text: &str, config: &ChunkConfig) -> Result<Vec<ChunkPiece>, ChunkError>;
}

/// Generates fixed-dimension vectors for texts.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier.
    fn model_name(&self) -> &str;

    /// Vector dimension this model produces.
    fn dimension(&self) -> usize;

    /// Service input ceiling in estimated tokens.
    fn max_input_tokens(&self) -> usize;

    /// Embed one batch of texts, returning one row per input in input
    /// order. The batch must not exceed the service's batch cap; callers
    /// split larger inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<EmbedBatch, EmbedError>;

    /// Embed a single query string.
    async fn embed_query(&self, query: &str) -> Result<EmbeddingOutput, EmbedError> {
        let batch = self.embed_batch(&[query]).await?;
        batch
            .outputs
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::InvalidResponse("empty embedding result".to_string()))
    }
}

/// Owner-scoped, append-only vector index with similarity search.
///
/// Appends for one owner are serialized; searches snapshot the entry list
/// and may run concurrently with each other and with queued appends.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Declared vector dimension.
    fn dimension(&self) -> usize;

    /// Append entries to an owner's index, waiting for the owner's write
    /// lock if another append is in flight.
    async fn append(&self, owner_id: &str, entries: Vec<IndexEntry>) -> Result<(), IndexError>;

    /// Append without waiting; returns [`IndexError::OwnerBusy`] when
    /// another writer holds the owner's lock.
    async fn try_append(&self, owner_id: &str, entries: Vec<IndexEntry>)
        -> Result<(), IndexError>;

    /// Top-K similarity search against one owner's index.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, IndexError>;

    /// Remove all entries belonging to one document. Returns the number
    /// of entries removed.
    async fn remove_document(&self, owner_id: &str, document_id: Uuid)
        -> Result<usize, IndexError>;

    /// Persist an owner's index to durable storage.
    async fn save(&self, owner_id: &str) -> Result<(), IndexError>;

    /// Statistics for an owner's index.
    async fn stats(&self, owner_id: &str) -> Result<IndexStats, IndexError>;
}

/// External text-completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a completion request and return the structured response.
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, ExecuteError>;
}
