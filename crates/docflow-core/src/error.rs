//! Error types for the docflow pipeline.

use thiserror::Error;

/// Result type alias using docflow's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Content extraction failed (unsupported or corrupt input).
    /// Fatal to the owning job: no downstream stage can run without text.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Every embedding backend in the chain was exhausted.
    /// Recorded on the document; non-fatal unless strict mode is requested.
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// Vector index upsert/query/delete failed.
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// A job stopped reporting progress and exhausted its stall recovery.
    #[error("Queue timeout: {0}")]
    QueueTimeout(String),

    /// Referenced document or job does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document not found by id.
    #[error("Document not found: {0}")]
    DocumentNotFound(uuid::Uuid),

    /// Job not found by id.
    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// Inference/generation failed (summary, classification).
    #[error("Inference error: {0}")]
    Inference(String),

    /// Job queue error (invalid transition, bad queue name, shutdown).
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input (bad priority, negative delay, empty payload).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed.
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl Error {
    /// Whether this error aborts all remaining stages of a document job.
    pub fn is_stage_fatal(&self) -> bool {
        matches!(self, Error::Extraction(_))
    }
}
