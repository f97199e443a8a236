//! Centralized default constants for the docflow pipeline.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Default maximum attempts before a job is permanently failed.
pub const JOB_MAX_ATTEMPTS: i32 = 3;

/// Minimum job priority (most urgent).
pub const PRIORITY_MIN: i32 = 1;

/// Maximum job priority (least urgent).
pub const PRIORITY_MAX: i32 = 10;

/// Default job priority.
pub const PRIORITY_DEFAULT: i32 = 5;

/// Base delay for exponential retry backoff, in milliseconds.
pub const RETRY_BASE_MS: u64 = 500;

/// Maximum random jitter added to each backoff delay, in milliseconds.
pub const RETRY_JITTER_MS: u64 = 250;

/// Default polling interval when a queue is empty (milliseconds).
pub const JOB_POLL_INTERVAL_MS: u64 = 200;

/// Default per-job execution timeout in seconds.
pub const JOB_TIMEOUT_SECS: u64 = 300;

/// A job with no progress report for this long is considered stalled.
pub const JOB_STALL_TIMEOUT_SECS: u64 = 30;

/// Interval between stalled-job sweeps (seconds).
pub const STALL_SWEEP_INTERVAL_SECS: u64 = 5;

/// Default grace period for scheduler shutdown (seconds).
pub const SHUTDOWN_GRACE_SECS: u64 = 30;

/// Default worker concurrency for the document-processing queue.
pub const DOCUMENT_QUEUE_CONCURRENCY: usize = 3;

/// Default worker concurrency for the notification queue.
pub const NOTIFICATION_QUEUE_CONCURRENCY: usize = 2;

/// Default worker concurrency for the webhook queue.
pub const WEBHOOK_QUEUE_CONCURRENCY: usize = 2;

/// Default age threshold for `cleanup`, in hours.
pub const CLEANUP_OLDER_THAN_HOURS: u64 = 24;

/// Scheduler event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Truncation limit for the Ollama embedding backend, in characters.
pub const OLLAMA_EMBED_MAX_CHARS: usize = 8_000;

/// Truncation limit for the OpenAI embedding backend, in characters.
pub const OPENAI_EMBED_MAX_CHARS: usize = 32_000;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "qwen3:8b";

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Target maximum summary length in characters.
pub const SUMMARY_MAX_CHARS: usize = 500;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Per-command timeout for external extraction tools (seconds).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// Page threshold for batch PDF extraction.
pub const LARGE_PDF_PAGE_THRESHOLD: usize = 100;

/// Pages per batch for large PDF extraction.
pub const PDF_BATCH_PAGES: usize = 50;

// =============================================================================
// VECTOR INDEX
// =============================================================================

/// Default top-k for index queries.
pub const QUERY_TOP_K: usize = 10;

/// Stored snippet length in characters.
pub const SNIPPET_LENGTH: usize = 200;

// =============================================================================
// WEBHOOKS
// =============================================================================

/// Default webhook HTTP request timeout in seconds.
pub const WEBHOOK_TIMEOUT_SECS: u64 = 10;
