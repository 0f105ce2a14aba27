//! # ragline-core
//!
//! Core types, traits and errors for the ragline retrieval pipeline.
//!
//! Ragline augments free-text prompts with excerpts retrieved from
//! user-uploaded documents. This crate provides the shared kernel the
//! stage crates build on:
//!
//! - **Extraction**: [`DocumentExtractor`] turns raw bytes into text
//! - **Chunking**: [`Chunker`] splits text into retrieval units
//! - **Embedding**: [`Embedder`] vectorizes chunk texts in batches
//! - **Indexing**: [`VectorIndex`] owner-scoped similarity search
//! - **Completion**: [`CompletionClient`] the downstream text service
//!
//! ## Data flow
//!
//! ```text
//! bytes → DocumentExtractor → Chunker → Embedder → VectorIndex
//!                                                      ↓
//!                          query → Embedder → search → context block
//! ```
//!
//! ## Ownership
//!
//! Every document, chunk, embedding and index is scoped to a single
//! owner id; nothing in this subsystem reads or writes across owners.
//!
//! ## Related crates
//!
//! - `ragline-extract`: format registry and extractors
//! - `ragline-chunker`: recursive separator-hierarchy splitter
//! - `ragline-embed`: HTTP embedding client, pool, test embedders
//! - `ragline-store`: per-owner flat index with snapshot persistence
//! - `ragline-index`: document lifecycle orchestration
//! - `ragline-retrieve`: search, rerank and context assembly
//! - `ragline-execute`: template rendering and completion calls

pub mod error;
pub mod tokens;
pub mod traits;
pub mod types;

pub use error::{
    ChunkError, EmbedError, Error, ExecuteError, ExtractError, IndexError, Result,
};
pub use tokens::{estimate_tokens, truncate_to_tokens, CHARS_PER_TOKEN};
pub use traits::*;
pub use types::*;
