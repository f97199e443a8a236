//! Extraction registry dispatching on declared media type.

use std::collections::HashMap;
use std::sync::Arc;

use docflow_core::{Error, Extraction, Extractor, Result};

use crate::extract::{OcrExtractor, PdfExtractor, TextExtractor, WordExtractor};

/// Strategy table mapping media types to extractors.
///
/// The table is closed at startup: dispatch never inspects content, only the
/// declared type. `image/*` acts as a family wildcard so individual image
/// types need no separate registration.
pub struct ExtractionRegistry {
    extractors: HashMap<String, Arc<dyn Extractor>>,
}

/// Lowercase a media type and strip parameters (`text/plain; charset=utf-8`
/// → `text/plain`).
fn normalize_media_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or(media_type)
        .trim()
        .to_lowercase()
}

impl ExtractionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Build the standard table: native text, PDF, Word, and (optionally)
    /// image OCR.
    pub fn with_defaults(ocr_enabled: bool) -> Self {
        let mut registry = Self::new();

        let text = Arc::new(TextExtractor);
        for media_type in ["text/plain", "text/markdown", "text/csv", "text/html"] {
            registry.register(media_type, text.clone());
        }

        registry.register("application/pdf", Arc::new(PdfExtractor));

        let word = Arc::new(WordExtractor);
        registry.register("application/msword", word.clone());
        registry.register(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            word,
        );

        if ocr_enabled {
            registry.register("image/*", Arc::new(OcrExtractor::new()));
        }

        registry
    }

    /// Register an extractor for a media type. Replaces any existing entry.
    pub fn register(&mut self, media_type: &str, extractor: Arc<dyn Extractor>) {
        self.extractors
            .insert(normalize_media_type(media_type), extractor);
    }

    /// Look up the extractor for a media type, falling back to the family
    /// wildcard (`image/*`).
    fn lookup(&self, media_type: &str) -> Option<&Arc<dyn Extractor>> {
        let normalized = normalize_media_type(media_type);
        if let Some(extractor) = self.extractors.get(&normalized) {
            return Some(extractor);
        }
        let family = normalized.split('/').next()?;
        self.extractors.get(&format!("{}/*", family))
    }

    /// Whether the registry can handle a media type.
    pub fn supports(&self, media_type: &str) -> bool {
        self.lookup(media_type).is_some()
    }

    /// All registered media type keys.
    pub fn registered_types(&self) -> Vec<&str> {
        self.extractors.keys().map(|s| s.as_str()).collect()
    }

    /// Extract content, or fail with an extraction error naming the type.
    pub async fn extract(&self, data: &[u8], media_type: &str) -> Result<Extraction> {
        let extractor = self.lookup(media_type).ok_or_else(|| {
            Error::Extraction(format!("Unsupported media type: {}", media_type))
        })?;
        extractor.extract(data, media_type).await
    }

    /// Run health checks on all registered extractors, keyed by extractor
    /// name.
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let mut results = HashMap::new();
        for extractor in self.extractors.values() {
            if results.contains_key(extractor.name()) {
                continue;
            }
            let healthy = extractor.health_check().await.unwrap_or(false);
            results.insert(extractor.name().to_string(), healthy);
        }
        results
    }
}

impl Default for ExtractionRegistry {
    fn default() -> Self {
        Self::with_defaults(false)
    }
}
