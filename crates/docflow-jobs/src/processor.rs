//! Document processor: the fixed stage sequence per document.
//!
//! Stages run in a fixed order (extract, metadata, embed, summarize,
//! classify) with the cancellation flag checked between stages. Extraction
//! failure is
//! fatal and aborts the rest; embedding, summary, and classification failures
//! are recorded per stage and only fail the document in strict mode.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{info, warn};
use uuid::Uuid;

use docflow_core::{
    defaults, CancelFlag, DocumentLabel, DocumentStatus, EmbeddingRecord, Error, IndexEntry,
    StageFlags, VectorIndex,
};
use docflow_inference::{Classifier, EmbeddingChain, Summarizer};

use crate::extraction::ExtractionRegistry;

/// One pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Metadata,
    Embed,
    Summarize,
    Classify,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extract => write!(f, "extract"),
            Self::Metadata => write!(f, "metadata"),
            Self::Embed => write!(f, "embed"),
            Self::Summarize => write!(f, "summarize"),
            Self::Classify => write!(f, "classify"),
        }
    }
}

/// A recorded stage failure.
#[derive(Debug, Clone)]
pub struct StageError {
    pub stage: Stage,
    pub error: String,
    /// Fatal errors abort the remaining stages and fail the document.
    pub fatal: bool,
    /// Retryable errors (vector store) bubble up to the queue retry policy.
    pub retryable: bool,
}

/// Aggregate result of one processing run.
#[derive(Debug, Default)]
pub struct ProcessOutcome {
    pub status: DocumentStatus,
    pub extracted_text: Option<String>,
    pub metadata: Option<JsonValue>,
    pub embedding: Option<EmbeddingRecord>,
    pub summary: Option<String>,
    pub classification: Option<DocumentLabel>,
    pub stage_errors: Vec<StageError>,
    /// Set when cancellation stopped the run at a stage boundary.
    pub cancelled: bool,
}

impl ProcessOutcome {
    pub fn has_fatal_error(&self) -> bool {
        self.stage_errors.iter().any(|e| e.fatal)
    }

    /// First retryable stage error, if any.
    pub fn retryable_error(&self) -> Option<&StageError> {
        self.stage_errors.iter().find(|e| e.retryable)
    }
}

/// Orchestrates the stage sequence for one document at a time.
pub struct DocumentProcessor {
    registry: Arc<ExtractionRegistry>,
    chain: Arc<EmbeddingChain>,
    summarizer: Arc<Summarizer>,
    classifier: Arc<Classifier>,
    index: Option<Arc<dyn VectorIndex>>,
}

impl DocumentProcessor {
    pub fn new(
        registry: Arc<ExtractionRegistry>,
        chain: Arc<EmbeddingChain>,
        summarizer: Arc<Summarizer>,
        classifier: Arc<Classifier>,
        index: Option<Arc<dyn VectorIndex>>,
    ) -> Self {
        Self {
            registry,
            chain,
            summarizer,
            classifier,
            index,
        }
    }

    /// Run the enabled stages for one document.
    ///
    /// `progress` receives coarse percentages as stages complete. The source
    /// bytes are never mutated.
    pub async fn process<F>(
        &self,
        document_id: Uuid,
        data: &[u8],
        media_type: &str,
        flags: StageFlags,
        cancel: &CancelFlag,
        progress: F,
    ) -> ProcessOutcome
    where
        F: Fn(i32, Option<&str>),
    {
        let mut outcome = ProcessOutcome::default();
        let mut extraction_meta = JsonValue::Null;

        // Stage 1: extract. Required by any text-dependent stage; failure is
        // fatal for the whole job.
        if flags.requires_text() {
            progress(10, Some("Extracting text"));
            match self.registry.extract(data, media_type).await {
                Ok(extraction) => {
                    outcome.extracted_text = extraction.text;
                    extraction_meta = extraction.metadata;
                }
                Err(e) => {
                    warn!(%document_id, media_type, error = %e, "Extraction failed");
                    outcome.stage_errors.push(StageError {
                        stage: Stage::Extract,
                        error: e.to_string(),
                        fatal: true,
                        retryable: false,
                    });
                    outcome.status = DocumentStatus::Failed;
                    return outcome;
                }
            }
            progress(30, Some("Text extracted"));
        }

        if self.check_cancelled(cancel, &mut outcome, flags) {
            return outcome;
        }

        // Stage 2: structural metadata, derived whether or not text came out.
        if flags.extract_metadata {
            let mut metadata = serde_json::Map::new();
            metadata.insert("size_bytes".to_string(), data.len().into());
            metadata.insert("media_type".to_string(), media_type.into());
            if let Some(extra) = extraction_meta.as_object() {
                for (key, value) in extra {
                    metadata.insert(key.clone(), value.clone());
                }
            }
            outcome.metadata = Some(JsonValue::Object(metadata));
            progress(40, Some("Metadata derived"));
        }

        if self.check_cancelled(cancel, &mut outcome, flags) {
            return outcome;
        }

        // Downstream stages need non-empty text.
        let text = outcome
            .extracted_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_owned);

        // Stage 3: embedding. Chain exhaustion is recorded, not fatal.
        if flags.generate_embeddings {
            if let Some(ref text) = text {
                match self.chain.embed(text).await {
                    Ok(embedded) => {
                        let record =
                            EmbeddingRecord::new(document_id, embedded.vector, embedded.provider);
                        if let Some(index) = &self.index {
                            let entry = IndexEntry {
                                id: document_id,
                                vector: record.vector.clone(),
                                metadata: serde_json::json!({
                                    "media_type": media_type,
                                    "provider": record.provider,
                                }),
                                snippet: text.chars().take(defaults::SNIPPET_LENGTH).collect(),
                            };
                            if let Err(e) = index.upsert(entry).await {
                                // Store trouble is transient; let the queue
                                // retry the job.
                                warn!(%document_id, error = %e, "Vector index upsert failed");
                                outcome.stage_errors.push(StageError {
                                    stage: Stage::Embed,
                                    error: e.to_string(),
                                    fatal: false,
                                    retryable: matches!(e, Error::VectorStore(_)),
                                });
                            }
                        }
                        outcome.embedding = Some(record);
                    }
                    Err(e) => {
                        warn!(%document_id, error = %e, "Embedding chain exhausted");
                        outcome.stage_errors.push(StageError {
                            stage: Stage::Embed,
                            error: e.to_string(),
                            fatal: false,
                            retryable: false,
                        });
                    }
                }
                progress(60, Some("Embedding generated"));
            }

            if self.check_cancelled(cancel, &mut outcome, flags) {
                return outcome;
            }
        }

        // Stage 4: summary.
        if flags.generate_summary {
            if let Some(ref text) = text {
                match self.summarizer.summarize(text).await {
                    Ok(summary) if !summary.is_empty() => outcome.summary = Some(summary),
                    Ok(_) => {}
                    Err(e) => {
                        outcome.stage_errors.push(StageError {
                            stage: Stage::Summarize,
                            error: e.to_string(),
                            fatal: false,
                            retryable: false,
                        });
                    }
                }
                progress(75, Some("Summary generated"));
            }

            if self.check_cancelled(cancel, &mut outcome, flags) {
                return outcome;
            }
        }

        // Stage 5: classification.
        if flags.classify_document {
            if let Some(ref text) = text {
                match self.classifier.classify(text).await {
                    Ok(label) => outcome.classification = Some(label),
                    Err(e) => {
                        outcome.stage_errors.push(StageError {
                            stage: Stage::Classify,
                            error: e.to_string(),
                            fatal: false,
                            retryable: false,
                        });
                    }
                }
                progress(90, Some("Classified"));
            }
        }

        outcome.status = Self::aggregate_status(&outcome, flags);
        info!(
            %document_id,
            status = %outcome.status,
            errors = outcome.stage_errors.len(),
            "Document processing finished"
        );
        progress(100, Some("Done"));
        outcome
    }

    /// Check the cancellation flag at a stage boundary. A cancelled run keeps
    /// the results of completed stages.
    fn check_cancelled(
        &self,
        cancel: &CancelFlag,
        outcome: &mut ProcessOutcome,
        flags: StageFlags,
    ) -> bool {
        if cancel.is_cancelled() && !outcome.cancelled {
            outcome.cancelled = true;
            outcome.status = Self::aggregate_status(outcome, flags);
            info!("Processing cancelled at stage boundary");
        }
        outcome.cancelled
    }

    /// Document status per the stage failure policy: fatal errors fail,
    /// strict mode promotes any error to failure, everything else completes.
    fn aggregate_status(outcome: &ProcessOutcome, flags: StageFlags) -> DocumentStatus {
        if outcome.has_fatal_error() {
            DocumentStatus::Failed
        } else if flags.strict && !outcome.stage_errors.is_empty() {
            DocumentStatus::Failed
        } else {
            DocumentStatus::Completed
        }
    }
}
