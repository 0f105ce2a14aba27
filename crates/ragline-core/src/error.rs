//! Error taxonomy for the ragline pipeline.
//!
//! Each stage has its own error enum; the top-level [`Error`] wraps them
//! for callers that drive the whole pipeline. Retryable conditions
//! (transient service failures, owner-lock contention) are distinct
//! variants so callers never have to parse message text.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Text extraction failed
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Chunking failed
    #[error("chunking error: {0}")]
    Chunk(#[from] ChunkError),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embed(#[from] EmbedError),

    /// Vector index operation failed
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Execution failed
    #[error("execution error: {0}")]
    Execute(#[from] ExecuteError),

    /// No document with this id under the given owner
    #[error("document not found: {0}")]
    DocumentNotFound(Uuid),

    /// Processing was cancelled between stages
    #[error("document processing cancelled")]
    Cancelled,

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Document extraction errors. All fatal for the document, never retried.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chunking errors.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Embedding service errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Non-transient service rejection (auth failure, malformed input).
    #[error("embedding service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Network-level failure reaching the service.
    #[error("embedding transport error: {0}")]
    Transport(String),

    /// Transient failures persisted through the whole retry budget.
    #[error("embedding failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// The service returned vectors of an unexpected dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The response body did not have the expected shape.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Vector index errors.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Entry vector does not match the index's declared dimension.
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Another writer holds the owner's append lock. Retryable.
    #[error("index for owner {0} is busy")]
    OwnerBusy(String),

    #[error("failed to persist index: {0}")]
    Persist(String),

    #[error("failed to load index: {0}")]
    Load(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Execution engine errors.
#[derive(Error, Debug)]
pub enum ExecuteError {
    /// A template placeholder has no supplied value. Raised before any
    /// external call.
    #[error("missing value for template variable: {0}")]
    MissingVariable(String),

    /// Non-transient service rejection (auth, content policy).
    #[error("completion service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("completion transport error: {0}")]
    Transport(String),

    #[error("completion call timed out after {0} seconds")]
    Timeout(u64),

    #[error("completion failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
