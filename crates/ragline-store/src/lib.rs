//! Vector storage for the ragline pipeline.
//!
//! [`FlatIndex`] implements the per-owner [`ragline_core::VectorIndex`]
//! seam with an exhaustive cosine scan and optional on-disk persistence.

mod flat;

pub use flat::FlatIndex;
