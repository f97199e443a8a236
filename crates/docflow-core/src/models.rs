//! Core data model for documents, jobs, and queue bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;

// =============================================================================
// DOCUMENT
// =============================================================================

/// Overall processing status of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Classification label from the closed label set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentLabel {
    Legal,
    Financial,
    Technical,
    Medical,
    Academic,
    #[default]
    Other,
}

impl DocumentLabel {
    /// All labels in the closed set.
    pub const ALL: [DocumentLabel; 6] = [
        Self::Legal,
        Self::Financial,
        Self::Technical,
        Self::Medical,
        Self::Academic,
        Self::Other,
    ];
}

impl std::fmt::Display for DocumentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legal => write!(f, "legal"),
            Self::Financial => write!(f, "financial"),
            Self::Technical => write!(f, "technical"),
            Self::Medical => write!(f, "medical"),
            Self::Academic => write!(f, "academic"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for DocumentLabel {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legal" => Ok(Self::Legal),
            "financial" => Ok(Self::Financial),
            "technical" => Ok(Self::Technical),
            "medical" => Ok(Self::Medical),
            "academic" => Ok(Self::Academic),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown document label: {}", s)),
        }
    }
}

/// An embedding vector attached to a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub document_id: Uuid,
    pub vector: Vec<f32>,
    pub dimension: usize,
    /// Name of the backend that produced the vector.
    pub provider: String,
    pub generated_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    pub fn new(document_id: Uuid, vector: Vec<f32>, provider: impl Into<String>) -> Self {
        Self {
            document_id,
            dimension: vector.len(),
            vector,
            provider: provider.into(),
            generated_at: Utc::now(),
        }
    }
}

/// A document moving through the pipeline.
///
/// `summary`, `classification`, and `embedding` may only be set once
/// `extracted_text` is set; [`Document::invariant_holds`] checks this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// Declared media type of the uploaded bytes (e.g. `application/pdf`).
    pub media_type: String,
    pub size_bytes: i64,
    pub extracted_text: Option<String>,
    pub summary: Option<String>,
    pub classification: Option<DocumentLabel>,
    pub embedding: Option<EmbeddingRecord>,
    /// Free-form structural metadata (page count, pixel dimensions, ...).
    pub metadata: JsonValue,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a new pending document record.
    pub fn new(media_type: impl Into<String>, size_bytes: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            media_type: media_type.into(),
            size_bytes,
            extracted_text: None,
            summary: None,
            classification: None,
            embedding: None,
            metadata: JsonValue::Null,
            status: DocumentStatus::Pending,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    /// Check the derived-field invariant: no summary/classification/embedding
    /// without extracted text.
    pub fn invariant_holds(&self) -> bool {
        if self.extracted_text.is_some() {
            return true;
        }
        self.summary.is_none() && self.classification.is_none() && self.embedding.is_none()
    }
}

// =============================================================================
// STAGE FLAGS
// =============================================================================

/// Which pipeline stages a job should run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFlags {
    #[serde(default)]
    pub extract_text: bool,
    #[serde(default)]
    pub extract_metadata: bool,
    #[serde(default)]
    pub generate_embeddings: bool,
    #[serde(default)]
    pub generate_summary: bool,
    #[serde(default)]
    pub classify_document: bool,
    /// When set, non-fatal stage failures fail the whole document.
    #[serde(default)]
    pub strict: bool,
}

impl StageFlags {
    /// All content stages enabled, strict off.
    pub fn all() -> Self {
        Self {
            extract_text: true,
            extract_metadata: true,
            generate_embeddings: true,
            generate_summary: true,
            classify_document: true,
            strict: false,
        }
    }

    /// Whether any requested stage depends on extracted text.
    pub fn requires_text(&self) -> bool {
        self.extract_text
            || self.generate_embeddings
            || self.generate_summary
            || self.classify_document
    }

    /// Whether any stage at all is requested.
    pub fn any(&self) -> bool {
        self.requires_text() || self.extract_metadata
    }
}

// =============================================================================
// JOBS
// =============================================================================

/// Named queues the scheduler manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
    DocumentProcessing,
    Notification,
    Webhook,
}

impl QueueName {
    pub const ALL: [QueueName; 3] = [
        Self::DocumentProcessing,
        Self::Notification,
        Self::Webhook,
    ];

    /// Default worker pool size for this queue.
    pub fn default_concurrency(&self) -> usize {
        match self {
            Self::DocumentProcessing => defaults::DOCUMENT_QUEUE_CONCURRENCY,
            Self::Notification => defaults::NOTIFICATION_QUEUE_CONCURRENCY,
            Self::Webhook => defaults::WEBHOOK_QUEUE_CONCURRENCY,
        }
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentProcessing => write!(f, "document-processing"),
            Self::Notification => write!(f, "notification"),
            Self::Webhook => write!(f, "webhook"),
        }
    }
}

impl std::str::FromStr for QueueName {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "document-processing" => Ok(Self::DocumentProcessing),
            "notification" => Ok(Self::Notification),
            "webhook" => Ok(Self::Webhook),
            _ => Err(format!("Unknown queue name: {}", s)),
        }
    }
}

/// Job lifecycle status. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Validate a status transition.
    ///
    /// `InProgress → Queued` is the retry/stall-recovery re-queue; everything
    /// else moves strictly forward. Terminal states accept nothing.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Queued) => true,
            (Queued, InProgress) => true,
            (Queued, Failed) => true,
            (InProgress, Completed) => true,
            (InProgress, Failed) => true,
            (InProgress, Queued) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Queued => write!(f, "queued"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A job in one of the named queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub document_id: Option<Uuid>,
    pub queue: QueueName,
    pub status: JobStatus,
    /// Priority in `[1, 10]`; 1 is most urgent.
    pub priority: i32,
    pub payload: Option<JsonValue>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub progress_percent: i32,
    pub progress_message: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    /// The job is invisible to workers until this instant (delay/backoff).
    pub visible_at: DateTime<Utc>,
    /// A stalled job is re-queued at most once.
    pub stall_recovered: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_progress_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job with validated priority and delay.
    pub fn new(
        queue: QueueName,
        document_id: Option<Uuid>,
        payload: Option<JsonValue>,
        priority: i32,
        delay: std::time::Duration,
    ) -> crate::Result<Self> {
        if !(defaults::PRIORITY_MIN..=defaults::PRIORITY_MAX).contains(&priority) {
            return Err(crate::Error::InvalidInput(format!(
                "Priority must be in [{}, {}], got {}",
                defaults::PRIORITY_MIN,
                defaults::PRIORITY_MAX,
                priority
            )));
        }
        let now = Utc::now();
        let delay = chrono::Duration::from_std(delay)
            .map_err(|_| crate::Error::InvalidInput("Delay out of range".to_string()))?;
        Ok(Self {
            id: Uuid::new_v4(),
            document_id,
            queue,
            status: JobStatus::Pending,
            priority,
            payload,
            result: None,
            error_message: None,
            progress_percent: 0,
            progress_message: None,
            attempts: 0,
            max_attempts: defaults::JOB_MAX_ATTEMPTS,
            visible_at: now + delay,
            stall_recovered: false,
            created_at: now,
            started_at: None,
            completed_at: None,
            failed_at: None,
            last_progress_at: None,
        })
    }

    /// Whether this job has retries left.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Terminal timestamp, if the job has reached one.
    pub fn terminal_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            JobStatus::Completed => self.completed_at,
            JobStatus::Failed => self.failed_at,
            _ => None,
        }
    }
}

/// Point-in-time status report for a single job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub state: JobStatus,
    pub progress: i32,
    pub attempts_made: i32,
    pub error: Option<String>,
}

/// Per-queue statistics summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub delayed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_document_status_terminal() {
        assert!(!DocumentStatus::Pending.is_terminal());
        assert!(!DocumentStatus::Processing.is_terminal());
        assert!(DocumentStatus::Completed.is_terminal());
        assert!(DocumentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_document_label_roundtrip() {
        for label in DocumentLabel::ALL {
            let parsed: DocumentLabel = label.to_string().parse().unwrap();
            assert_eq!(parsed, label);
        }
        assert!("unknown".parse::<DocumentLabel>().is_err());
        assert_eq!("  Legal ".parse::<DocumentLabel>().unwrap(), DocumentLabel::Legal);
    }

    #[test]
    fn test_document_label_default_is_other() {
        assert_eq!(DocumentLabel::default(), DocumentLabel::Other);
    }

    #[test]
    fn test_document_invariant() {
        let mut doc = Document::new("text/plain", 10);
        assert!(doc.invariant_holds());

        doc.summary = Some("a summary".to_string());
        assert!(!doc.invariant_holds());

        doc.extracted_text = Some("some text".to_string());
        assert!(doc.invariant_holds());
    }

    #[test]
    fn test_stage_flags_requires_text() {
        let mut flags = StageFlags::default();
        assert!(!flags.requires_text());
        assert!(!flags.any());

        flags.extract_metadata = true;
        assert!(!flags.requires_text());
        assert!(flags.any());

        flags.generate_summary = true;
        assert!(flags.requires_text());
    }

    #[test]
    fn test_stage_flags_all() {
        let flags = StageFlags::all();
        assert!(flags.extract_text);
        assert!(flags.extract_metadata);
        assert!(flags.generate_embeddings);
        assert!(flags.generate_summary);
        assert!(flags.classify_document);
        assert!(!flags.strict);
    }

    #[test]
    fn test_queue_name_roundtrip() {
        for queue in QueueName::ALL {
            let parsed: QueueName = queue.to_string().parse().unwrap();
            assert_eq!(parsed, queue);
        }
        assert!("unknown-queue".parse::<QueueName>().is_err());
    }

    #[test]
    fn test_queue_name_serde() {
        let json = serde_json::to_string(&QueueName::DocumentProcessing).unwrap();
        assert_eq!(json, "\"document-processing\"");
    }

    #[test]
    fn test_job_status_forward_only() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Queued));
        assert!(Queued.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));
        assert!(InProgress.can_transition_to(Queued)); // retry re-queue

        // No backwards motion from terminal states
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Queued));
        assert!(!Failed.can_transition_to(InProgress));
        assert!(!Completed.can_transition_to(Failed));

        // No skipping
        assert!(!Pending.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_job_new_validates_priority() {
        let ok = Job::new(QueueName::DocumentProcessing, None, None, 5, Duration::ZERO);
        assert!(ok.is_ok());

        let low = Job::new(QueueName::DocumentProcessing, None, None, 0, Duration::ZERO);
        assert!(low.is_err());

        let high = Job::new(QueueName::DocumentProcessing, None, None, 11, Duration::ZERO);
        assert!(high.is_err());
    }

    #[test]
    fn test_job_new_applies_delay() {
        let job = Job::new(
            QueueName::Webhook,
            None,
            None,
            5,
            Duration::from_secs(60),
        )
        .unwrap();
        assert!(job.visible_at > Utc::now() + chrono::Duration::seconds(30));
    }

    #[test]
    fn test_job_can_retry() {
        let mut job = Job::new(QueueName::DocumentProcessing, None, None, 5, Duration::ZERO).unwrap();
        assert_eq!(job.max_attempts, 3);
        assert!(job.can_retry());
        job.attempts = 3;
        assert!(!job.can_retry());
    }

    #[test]
    fn test_job_terminal_at() {
        let mut job = Job::new(QueueName::Notification, None, None, 5, Duration::ZERO).unwrap();
        assert!(job.terminal_at().is_none());

        job.status = JobStatus::Failed;
        job.failed_at = Some(Utc::now());
        assert!(job.terminal_at().is_some());
    }

    #[test]
    fn test_embedding_record_dimension() {
        let record = EmbeddingRecord::new(Uuid::new_v4(), vec![0.1, 0.2, 0.3], "hashed");
        assert_eq!(record.dimension, 3);
        assert_eq!(record.provider, "hashed");
    }
}
