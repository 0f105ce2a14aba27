//! Prompt execution for the ragline pipeline.
//!
//! [`render_template`] fills `{{variable}}` placeholders,
//! [`OpenAiCompletions`] talks to an OpenAI-compatible chat endpoint,
//! and [`ExecutionEngine`] ties them together with optional retrieved
//! context, producing an [`ragline_core::ExecutionRecord`] per call.

mod engine;
mod openai;
mod template;

pub use engine::ExecutionEngine;
pub use openai::OpenAiCompletions;
pub use template::render_template;
