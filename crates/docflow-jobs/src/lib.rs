//! # docflow-jobs
//!
//! The working half of the docflow pipeline:
//!
//! - named job queues with bounded worker pools, priority dispatch, delays,
//!   retry with exponential backoff, stalled-job recovery, pause/resume, and
//!   graceful shutdown ([`Scheduler`]);
//! - the media-type extraction registry and format extractors;
//! - the document processor running the fixed stage sequence;
//! - queue handlers for document processing, notifications, and webhooks.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docflow_jobs::{Scheduler, SchedulerConfig, DocumentJobHandler};
//! use docflow_store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new());
//! let scheduler = Scheduler::new(store.clone(), SchedulerConfig::from_env());
//! scheduler.process(QueueName::DocumentProcessing, 3, handler).await?;
//! let job_id = scheduler
//!     .enqueue(QueueName::DocumentProcessing, Some(doc_id), Some(payload), 5, Duration::ZERO)
//!     .await?;
//! ```

pub mod document_handler;
pub mod extract;
pub mod extraction;
pub mod handler;
pub mod notify_handler;
pub mod processor;
pub mod queue;
pub mod webhook;
pub mod worker;

pub use document_handler::DocumentJobHandler;
pub use extract::{OcrExtractor, PdfExtractor, TextExtractor, WordExtractor};
pub use extraction::ExtractionRegistry;
pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use notify_handler::NotificationHandler;
pub use processor::{DocumentProcessor, ProcessOutcome, Stage, StageError};
pub use queue::{Scheduler, SchedulerConfig};
pub use webhook::{HttpWebhookDeliverer, WebhookHandler};
pub use worker::{backoff_delay, JobEvent};
