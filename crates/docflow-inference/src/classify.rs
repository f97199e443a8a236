//! Document classification into the closed label set.

use std::sync::Arc;

use docflow_core::{DocumentLabel, GenerationBackend, Result};
use tracing::warn;

/// Keyword table for the deterministic fallback, in tie-break order.
const KEYWORDS: &[(DocumentLabel, &[&str])] = &[
    (
        DocumentLabel::Legal,
        &[
            "contract",
            "agreement",
            "plaintiff",
            "defendant",
            "clause",
            "whereas",
            "jurisdiction",
            "statute",
        ],
    ),
    (
        DocumentLabel::Financial,
        &[
            "invoice",
            "revenue",
            "balance sheet",
            "fiscal",
            "profit",
            "expense",
            "quarterly",
            "audit",
        ],
    ),
    (
        DocumentLabel::Technical,
        &[
            "software",
            "api",
            "server",
            "algorithm",
            "database",
            "deployment",
            "protocol",
            "latency",
        ],
    ),
    (
        DocumentLabel::Medical,
        &[
            "patient",
            "diagnosis",
            "clinical",
            "treatment",
            "symptom",
            "dosage",
            "physician",
        ],
    ),
    (
        DocumentLabel::Academic,
        &[
            "abstract",
            "hypothesis",
            "methodology",
            "literature review",
            "citation",
            "thesis",
            "peer review",
        ],
    ),
];

/// Classifier backed by an optional generation backend.
///
/// The backend's answer is normalized into the closed set; anything the
/// backend cannot resolve falls back to keyword matching, which always
/// resolves, to [`DocumentLabel::Other`] when no keyword matches.
pub struct Classifier {
    backend: Option<Arc<dyn GenerationBackend>>,
}

impl Classifier {
    pub fn new(backend: Option<Arc<dyn GenerationBackend>>) -> Self {
        Self { backend }
    }

    /// Classify text into one label of the closed set.
    pub async fn classify(&self, text: &str) -> Result<DocumentLabel> {
        if let Some(backend) = &self.backend {
            let labels: Vec<String> = DocumentLabel::ALL.iter().map(|l| l.to_string()).collect();
            let prompt = format!(
                "Classify the following document into exactly one of these categories: {}. \
                Respond with the category name only.\n\n{}",
                labels.join(", "),
                text
            );
            match backend.generate(&prompt).await {
                Ok(answer) => {
                    if let Some(label) = parse_label(&answer) {
                        return Ok(label);
                    }
                    warn!(
                        model = backend.model_name(),
                        answer = %answer.chars().take(80).collect::<String>(),
                        "Unparseable classification answer, using keyword fallback"
                    );
                }
                Err(e) => {
                    warn!(model = backend.model_name(), error = %e, "Classification failed, using keyword fallback");
                }
            }
        }

        Ok(keyword_classify(text))
    }
}

/// Find a known label in a model answer (first match wins).
fn parse_label(answer: &str) -> Option<DocumentLabel> {
    let answer = answer.trim().to_lowercase();
    if let Ok(label) = answer.parse::<DocumentLabel>() {
        return Some(label);
    }
    DocumentLabel::ALL
        .into_iter()
        .find(|label| answer.contains(&label.to_string()))
}

/// Deterministic keyword classification.
///
/// Scores each label by keyword occurrences in the lowercased text; the
/// highest score wins, ties broken by table order. No match resolves to
/// `Other`.
pub fn keyword_classify(text: &str) -> DocumentLabel {
    let haystack = text.to_lowercase();
    let mut best = (DocumentLabel::Other, 0usize);

    for (label, keywords) in KEYWORDS {
        let score: usize = keywords
            .iter()
            .map(|keyword| haystack.matches(keyword).count())
            .sum();
        if score > best.1 {
            best = (*label, score);
        }
    }

    best.0
}
