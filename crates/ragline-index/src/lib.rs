//! Document lifecycle orchestration for the ragline pipeline.
//!
//! [`PipelineService`] runs documents through extraction, chunking,
//! embedding, and indexing; [`DocumentRegistry`] holds the owner-scoped
//! records the service mutates along the way. Lifecycle transitions are
//! observable through [`PipelineEvent`] broadcasts.

mod pipeline;
mod registry;

pub use pipeline::{PipelineEvent, PipelineService};
pub use registry::DocumentRegistry;
