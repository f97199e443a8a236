//! # docflow-store
//!
//! In-memory reference implementation of the docflow persistence traits
//! ([`docflow_core::DocumentRepository`] and [`docflow_core::JobRepository`]).
//!
//! The durable relational layer is an external collaborator; this crate
//! exists so the scheduler, CLI, and tests run against the same narrow
//! interfaces that layer implements.

pub mod memory;

pub use memory::MemoryStore;
