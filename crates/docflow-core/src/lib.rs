//! # docflow-core
//!
//! Shared types, traits, and abstractions for the docflow document-processing
//! pipeline: the data model (documents, jobs, stage flags), the error
//! taxonomy, the collaborator traits every other crate implements or
//! consumes, centralized default constants, and the structured-logging field
//! schema.

pub mod cancel;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

pub use cancel::CancelFlag;
pub use error::{Error, Result};
pub use models::{
    Document, DocumentLabel, DocumentStatus, EmbeddingRecord, Job, JobStatus, JobStatusReport,
    QueueName, QueueStats, StageFlags,
};
pub use traits::{
    DeliveryReceipt, DocumentRepository, EmbeddingBackend, Extraction, Extractor,
    GenerationBackend, IndexEntry, JobRepository, LogNotifier, Notifier, QueryHit, VectorIndex,
    WebhookDeliverer,
};
