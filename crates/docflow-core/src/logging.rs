//! Structured logging field name constants for the docflow pipeline.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "jobs", "extract", "inference", "index", "store", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "enqueue", "claim_next", "embed", "extract", "deliver"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document UUID being operated on.
pub const DOCUMENT_ID: &str = "document_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Queue name the job belongs to.
pub const QUEUE: &str = "queue";

/// Pipeline stage name ("extract", "metadata", "embed", "summarize",
/// "classify").
pub const STAGE: &str = "stage";

/// Declared media type of the input.
pub const MEDIA_TYPE: &str = "media_type";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Attempt counter for a job execution.
pub const ATTEMPT: &str = "attempt";

/// Byte length of an input.
pub const INPUT_BYTES: &str = "input_bytes";

/// Character length of extracted text.
pub const TEXT_LEN: &str = "text_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Embedding or generation backend name.
pub const BACKEND: &str = "backend";

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Embedding vector dimension.
pub const DIMENSION: &str = "dimension";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
