//! Embedding generation for the ragline pipeline.
//!
//! [`OpenAiEmbedder`] talks to an OpenAI-compatible `/embeddings`
//! endpoint with retry and input truncation. [`NoopEmbedder`] produces
//! deterministic hash-derived vectors for tests and offline runs.
//! [`EmbedderPool`] caps concurrent service calls and drives
//! whole-document embedding in batches.

mod noop;
mod openai;
mod pool;

pub use noop::NoopEmbedder;
pub use openai::OpenAiEmbedder;
pub use pool::EmbedderPool;
