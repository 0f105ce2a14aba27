//! Core data types shared across the ragline pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use uuid::Uuid;

use crate::error::{ChunkError, EmbedError};
use crate::tokens::estimate_tokens;

/// Default ceiling on raw document size (10 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Declared format of an uploaded document.
///
/// This is a closed set: dispatch is by the tag the caller declares,
/// not by content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Fixed-layout documents (PDF).
    Pdf,
    /// Word-processor documents (DOCX).
    Docx,
    /// Plain UTF-8 text.
    #[serde(rename = "text")]
    PlainText,
    /// Lightweight markup (Markdown).
    Markdown,
}

impl DocumentFormat {
    /// Stable lowercase tag, matching the serialized form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "text",
            Self::Markdown => "markdown",
        }
    }

    /// Guess a format from a file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a document moving through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Upload recorded, nothing processed yet.
    Received,
    /// Text extraction finished.
    Extracted,
    /// Chunking finished.
    Chunked,
    /// All chunk embeddings generated.
    Embedded,
    /// Chunks and vectors appended to the owner's index.
    Indexed,
    /// A stage failed; see the document's `error` field.
    Failed,
    /// Processing was cancelled between stages.
    Cancelled,
}

impl DocumentStatus {
    /// Whether the pipeline will take no further action on this document.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Indexed | Self::Failed | Self::Cancelled)
    }
}

/// Record of a document owned by a single owner.
///
/// Mutated only by the pipeline task processing it; never by two stages
/// concurrently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier.
    pub id: Uuid,
    /// Owner this document (and all derived data) belongs to.
    pub owner_id: String,
    /// Display name, typically the uploaded file name.
    pub name: String,
    /// Declared format.
    pub format: DocumentFormat,
    /// Raw payload length in bytes.
    pub size_bytes: u64,
    /// Hex digest of the raw payload, for idempotent re-ingest checks.
    pub content_hash: String,
    /// Current lifecycle state.
    pub status: DocumentStatus,
    /// Failure detail when `status` is `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of chunks produced, set once chunking completes.
    pub chunk_count: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status-transition timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a freshly received document record.
    #[must_use]
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        format: DocumentFormat,
        size_bytes: u64,
        content_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            name: name.into(),
            format,
            size_bytes,
            content_hash: content_hash.into(),
            status: DocumentStatus::Received,
            error: None,
            chunk_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Structural metadata attached to a chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Estimated token count of the chunk text.
    pub token_count: usize,
    /// Page the chunk starts on, when the source has page markers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Nearest preceding section heading, when the source has headings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Set when the chunk was hard-cut after exhausting all separators.
    #[serde(default)]
    pub truncated: bool,
}

/// A bounded segment of a document's extracted text, the unit of retrieval.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk identifier.
    pub id: Uuid,
    /// Parent document.
    pub document_id: Uuid,
    /// Ordinal position within the document, starting at 0.
    pub sequence: u32,
    /// Chunk text.
    pub content: String,
    /// Byte offsets of `content` within the extracted text.
    pub byte_range: Range<u64>,
    /// Structural metadata.
    pub metadata: ChunkMetadata,
}

/// A chunk boundary produced by the chunker, before identifiers are
/// assigned.
///
/// Pieces are deterministic in (text, config); the pipeline turns them
/// into [`Chunk`] records.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPiece {
    /// Piece text, including any overlap carried from the previous piece.
    pub content: String,
    /// Byte offsets of the piece within the source text.
    pub byte_range: Range<u64>,
    /// Estimated token count.
    pub token_count: usize,
    /// Page attribution from the nearest preceding page marker.
    pub page: Option<u32>,
    /// Section attribution from the nearest preceding heading.
    pub section: Option<String>,
    /// Set when the piece was hard-cut.
    pub truncated: bool,
}

/// Chunking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Target chunk size in estimated tokens.
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    /// Overlap between consecutive chunks in estimated tokens.
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkConfig {
    /// Reject configurations that cannot make forward progress.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.size == 0 {
            return Err(ChunkError::InvalidConfig("chunk size must be positive".into()));
        }
        if self.overlap >= self.size {
            return Err(ChunkError::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.size
            )));
        }
        Ok(())
    }
}

/// Extraction metadata reported alongside the text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionInfo {
    /// Page count, for paginated formats.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    /// Section count, for heading-structured formats.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_count: Option<u32>,
    /// Whitespace-separated word count of the extracted text.
    pub word_count: u64,
    /// Character encoding the payload was decoded with.
    pub encoding: String,
}

/// Plain text extracted from a document, plus metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    /// Normalized text, including structural marker lines.
    pub text: String,
    /// Extraction metadata.
    pub info: ExtractionInfo,
}

/// A vector produced for one chunk by one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// Chunk this vector represents.
    pub chunk_id: Uuid,
    /// The vector, `dimension` floats.
    pub vector: Vec<f32>,
    /// Identifier of the generating model.
    pub model: String,
}

/// One embedding result row, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingOutput {
    /// The embedding vector.
    pub embedding: Vec<f32>,
    /// Estimated token count of the (possibly truncated) input.
    pub token_count: usize,
    /// Set when the input was truncated to the service maximum.
    pub truncated: bool,
}

/// Result of one batch call to the embedding service.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedBatch {
    /// One row per input, in input order.
    pub outputs: Vec<EmbeddingOutput>,
    /// Retry attempts consumed before the call succeeded.
    pub retries: usize,
}

/// Counters for one embedding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedStats {
    /// Inputs that received a vector.
    pub succeeded: usize,
    /// Inputs that did not.
    pub failed: usize,
    /// Retry attempts consumed across all batch calls.
    pub retries: usize,
}

/// Outcome of embedding a document's chunk texts.
///
/// `outputs` holds one row per successfully embedded input, in input
/// order. A batch that fails permanently stops the run: remaining inputs
/// count as `failed` and the cause lands in `failure`. The caller decides
/// from `stats` whether the document is embedded or failed.
#[derive(Debug)]
pub struct EmbedReport {
    /// Successful rows, in input order.
    pub outputs: Vec<EmbeddingOutput>,
    /// Success/failure/retry counters.
    pub stats: EmbedStats,
    /// Cause of early termination, if any.
    pub failure: Option<EmbedError>,
}

impl EmbedReport {
    /// Whether every input was embedded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.stats.failed == 0
    }
}

/// Embedding service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model identifier sent to the service.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Expected vector dimension for the model.
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    /// Maximum texts per service call; larger inputs are split.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Service input ceiling in estimated tokens; longer inputs are
    /// truncated to the longest prefix under this limit.
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
    /// Retries per batch call on transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in milliseconds; doubles per attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimension() -> usize {
    1536
}

fn default_batch_size() -> usize {
    100
}

fn default_max_input_tokens() -> usize {
    8191
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_batch_size(),
            max_input_tokens: default_max_input_tokens(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Parameters for a vector search against one owner's index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Owner whose index is searched.
    pub owner_id: String,
    /// Query vector; must match the index dimension.
    pub embedding: Vec<f32>,
    /// Maximum results.
    pub limit: usize,
    /// Results below this similarity are dropped; 0.0 disables the cut.
    pub min_similarity: f32,
    /// Restrict candidates to these documents when set.
    pub document_ids: Option<Vec<Uuid>>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching chunk.
    pub chunk_id: Uuid,
    /// Document the chunk belongs to.
    pub document_id: Uuid,
    /// Chunk text.
    pub content: String,
    /// Page attribution, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Section attribution, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Estimated token count of the chunk text.
    pub token_count: usize,
    /// Cosine similarity to the query vector.
    pub similarity: f32,
}

/// Statistics for one owner's index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Owner the stats describe.
    pub owner_id: String,
    /// Entries currently in the index.
    pub total_vectors: usize,
    /// Distinct documents represented.
    pub total_documents: usize,
    /// Declared vector dimension.
    pub dimension: usize,
}

/// Retrieval parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks to return after reranking.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Token budget for the assembled context block.
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    /// Similarity floor applied at search time; 0.0 disables it.
    #[serde(default)]
    pub min_similarity: f32,
    /// Rerank weight on vector similarity.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    /// Rerank weight on query-term overlap.
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,
}

fn default_top_k() -> usize {
    5
}

fn default_token_budget() -> usize {
    4000
}

fn default_vector_weight() -> f32 {
    0.7
}

fn default_lexical_weight() -> f32 {
    0.3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            token_budget: default_token_budget(),
            min_similarity: 0.0,
            vector_weight: default_vector_weight(),
            lexical_weight: default_lexical_weight(),
        }
    }
}

/// A chunk that survived reranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk identifier.
    pub chunk_id: Uuid,
    /// Source document.
    pub document_id: Uuid,
    /// Chunk text.
    pub content: String,
    /// Page attribution, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Section attribution, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Estimated token count.
    pub token_count: usize,
    /// Raw vector similarity.
    pub similarity: f32,
    /// Combined rerank score.
    pub rerank_score: f32,
}

/// The formatted, token-budgeted concatenation of retrieved chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBlock {
    /// Formatted text with source markers, empty when nothing matched.
    pub text: String,
    /// Estimated token count of `text`.
    pub token_count: usize,
    /// Chunks included, in order.
    pub chunk_ids: Vec<Uuid>,
}

impl ContextBlock {
    /// Whether no chunk made it into the block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunk_ids.is_empty()
    }
}

/// Result of one retrieval request. Transient, recomputed per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The raw query.
    pub query: String,
    /// Reranked chunks, scores non-increasing.
    pub chunks: Vec<RetrievedChunk>,
    /// Assembled context block.
    pub context: ContextBlock,
}

/// Request to the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Final prompt text.
    pub prompt: String,
    /// Model identifier.
    pub model: String,
    /// Generation cap, passed through when set.
    pub max_tokens: Option<u32>,
    /// Sampling temperature, passed through when set.
    pub temperature: Option<f32>,
}

/// Token usage reported by the completion service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Generated text.
    pub text: String,
    /// Model that produced it.
    pub model: String,
    /// Usage, when the service reports it.
    pub usage: Option<CompletionUsage>,
    /// Finish reason, when the service reports it.
    pub finish_reason: Option<String>,
}

/// Execution configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Completion model identifier.
    #[serde(default = "default_completion_model")]
    pub model: String,
    /// Generation cap forwarded to the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature forwarded to the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries on transient completion failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in milliseconds; doubles per attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_completion_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            max_tokens: None,
            temperature: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Append-only record of one execution, for auditability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique record identifier.
    pub id: Uuid,
    /// Template the prompt was rendered from.
    pub template: String,
    /// Variable values the template was resolved with.
    pub variables: TemplateVars,
    /// Length of the final prompt in characters, context section included.
    pub prompt_chars: usize,
    /// Generated text.
    pub response_text: String,
    /// Model that produced the response.
    pub model: String,
    /// Prompt-side token count.
    pub prompt_tokens: u32,
    /// Completion-side token count.
    pub completion_tokens: u32,
    /// Total tokens billed.
    pub total_tokens: u32,
    /// Finish reason, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Wall-clock latency of the completion call in milliseconds.
    pub latency_ms: u64,
    /// Context chunks injected into the prompt, in order.
    pub used_chunk_ids: Vec<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Variable values for template rendering, ordered for stable iteration.
pub type TemplateVars = BTreeMap<String, String>;

impl Chunk {
    /// Build a chunk record from a piece, assigning identity and position.
    #[must_use]
    pub fn from_piece(document_id: Uuid, sequence: u32, piece: ChunkPiece) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            sequence,
            content: piece.content,
            byte_range: piece.byte_range,
            metadata: ChunkMetadata {
                token_count: piece.token_count,
                page: piece.page,
                section: piece.section,
                truncated: piece.truncated,
            },
        }
    }

    /// Estimated token count, computed from the content when metadata is
    /// missing it.
    #[must_use]
    pub fn token_count(&self) -> usize {
        if self.metadata.token_count > 0 {
            self.metadata.token_count
        } else {
            estimate_tokens(&self.content)
        }
    }
}

/// A chunk paired with its embedding, ready for the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_format_serde_tags() {
        assert_eq!(serde_json::to_string(&DocumentFormat::Pdf).unwrap(), "\"pdf\"");
        assert_eq!(serde_json::to_string(&DocumentFormat::PlainText).unwrap(), "\"text\"");
        assert_eq!(
            serde_json::from_str::<DocumentFormat>("\"markdown\"").unwrap(),
            DocumentFormat::Markdown
        );
    }

    #[test]
    fn document_format_from_extension() {
        assert_eq!(DocumentFormat::from_extension("PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("md"), Some(DocumentFormat::Markdown));
        assert_eq!(DocumentFormat::from_extension("txt"), Some(DocumentFormat::PlainText));
        assert_eq!(DocumentFormat::from_extension("exe"), None);
    }

    #[test]
    fn document_status_terminality() {
        assert!(DocumentStatus::Indexed.is_terminal());
        assert!(DocumentStatus::Failed.is_terminal());
        assert!(DocumentStatus::Cancelled.is_terminal());
        assert!(!DocumentStatus::Received.is_terminal());
        assert!(!DocumentStatus::Embedded.is_terminal());
    }

    #[test]
    fn new_document_starts_received() {
        let doc = Document::new("owner-1", "notes.md", DocumentFormat::Markdown, 42, "abc");
        assert_eq!(doc.status, DocumentStatus::Received);
        assert_eq!(doc.chunk_count, 0);
        assert!(doc.error.is_none());
        assert_eq!(doc.created_at, doc.updated_at);
    }

    #[test]
    fn document_serde_round_trip() {
        let doc = Document::new("owner-1", "a.pdf", DocumentFormat::Pdf, 100, "hash");
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, doc.id);
        assert_eq!(back.format, DocumentFormat::Pdf);
        assert_eq!(back.status, DocumentStatus::Received);
    }

    #[test]
    fn chunk_config_defaults() {
        let config = ChunkConfig::default();
        assert_eq!(config.size, 1000);
        assert_eq!(config.overlap, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn chunk_config_rejects_zero_size() {
        let config = ChunkConfig { size: 0, overlap: 0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn chunk_config_rejects_overlap_ge_size() {
        let config = ChunkConfig { size: 100, overlap: 100 };
        assert!(config.validate().is_err());
        let config = ChunkConfig { size: 100, overlap: 150 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn embedding_config_defaults() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.dimension, 1536);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_input_tokens, 8191);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn retrieval_config_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.top_k, 5);
        assert_eq!(config.token_budget, 4000);
        assert_eq!(config.min_similarity, 0.0);
        assert!((config.vector_weight - 0.7).abs() < f32::EPSILON);
        assert!((config.lexical_weight - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn chunk_from_piece_carries_metadata() {
        let document_id = Uuid::new_v4();
        let piece = ChunkPiece {
            content: "hello world".to_string(),
            byte_range: 0..11,
            token_count: 3,
            page: Some(2),
            section: Some("Intro".to_string()),
            truncated: false,
        };
        let chunk = Chunk::from_piece(document_id, 0, piece);
        assert_eq!(chunk.document_id, document_id);
        assert_eq!(chunk.sequence, 0);
        assert_eq!(chunk.metadata.page, Some(2));
        assert_eq!(chunk.metadata.section.as_deref(), Some("Intro"));
        assert_eq!(chunk.token_count(), 3);
    }

    #[test]
    fn empty_context_block() {
        let block = ContextBlock::default();
        assert!(block.is_empty());
        assert_eq!(block.token_count, 0);
    }

    #[test]
    fn embed_report_completeness() {
        let complete = EmbedReport {
            outputs: vec![],
            stats: EmbedStats::default(),
            failure: None,
        };
        assert!(complete.is_complete());

        let failed = EmbedReport {
            outputs: vec![],
            stats: EmbedStats { succeeded: 1, failed: 2, retries: 3 },
            failure: None,
        };
        assert!(!failed.is_complete());
    }

    #[test]
    fn chunk_serde_round_trip() {
        let chunk = Chunk {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            sequence: 3,
            content: "some text".to_string(),
            byte_range: 10..19,
            metadata: ChunkMetadata {
                token_count: 3,
                page: None,
                section: Some("Setup".to_string()),
                truncated: true,
            },
        };
        let json = serde_json::to_string(&chunk).unwrap();
        let back: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chunk);
    }
}
