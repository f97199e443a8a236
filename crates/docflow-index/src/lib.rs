//! # docflow-index
//!
//! Vector store client for the docflow pipeline: an in-process
//! implementation of [`docflow_core::VectorIndex`] with cosine ranking,
//! metadata filtering, threshold cuts, and dimension enforcement.

pub mod memory;

pub use memory::{cosine_similarity, MemoryVectorIndex};
