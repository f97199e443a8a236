//! Text summarization with a deterministic extractive fallback.

use std::sync::Arc;

use docflow_core::{defaults, GenerationBackend, Result};
use tracing::warn;

/// Summarizer backed by an optional generation backend.
///
/// With no backend configured (or when the backend fails) the extractive
/// fallback takes over: the leading sentences of the input, bounded by
/// `max_chars`. The fallback is deterministic and returns non-empty output
/// for any non-empty input.
pub struct Summarizer {
    backend: Option<Arc<dyn GenerationBackend>>,
    max_chars: usize,
}

impl Summarizer {
    pub fn new(backend: Option<Arc<dyn GenerationBackend>>) -> Self {
        Self {
            backend,
            max_chars: defaults::SUMMARY_MAX_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Summarize the given text.
    pub async fn summarize(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        if let Some(backend) = &self.backend {
            let prompt = format!(
                "Summarize the following text in approximately {} characters or less. \
                Focus on the key points and main ideas:\n\n{}",
                self.max_chars, text
            );
            match backend.generate(&prompt).await {
                Ok(summary) if !summary.trim().is_empty() => return Ok(summary),
                Ok(_) => {
                    warn!(model = backend.model_name(), "Empty summary from backend, using extractive fallback");
                }
                Err(e) => {
                    warn!(model = backend.model_name(), error = %e, "Summary generation failed, using extractive fallback");
                }
            }
        }

        Ok(extractive_summary(text, self.max_chars))
    }
}

/// Deterministic extractive summary: leading sentences up to `max_chars`.
///
/// Always non-empty for non-empty input: when even the first sentence is
/// over budget it is truncated at a char boundary rather than dropped.
pub fn extractive_summary(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let mut summary = String::new();

    for sentence in split_sentences(text) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        if !summary.is_empty() && summary.len() + sentence.len() + 1 > max_chars {
            break;
        }
        if !summary.is_empty() {
            summary.push(' ');
        }
        summary.push_str(sentence);
        if summary.len() >= max_chars {
            break;
        }
    }

    if summary.len() > max_chars {
        let end = summary
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(summary.len());
        summary.truncate(end);
    }

    summary
}

/// Split on sentence-ending punctuation, keeping the terminator attached.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '\n') {
            let end = i + c.len_utf8();
            if end > start {
                sentences.push(&text[start..end]);
            }
            start = end;
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}
