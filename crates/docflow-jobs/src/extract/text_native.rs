//! Native text extractor for plain text, markdown, CSV, and HTML.

use async_trait::async_trait;

use docflow_core::{Extraction, Extractor, Result};

/// Reads bytes as UTF-8 (lossy for invalid sequences) and returns the text
/// with char/line counts as metadata.
pub struct TextExtractor;

#[async_trait]
impl Extractor for TextExtractor {
    async fn extract(&self, data: &[u8], _media_type: &str) -> Result<Extraction> {
        let text = String::from_utf8_lossy(data).into_owned();
        let char_count = text.len();
        let line_count = text.lines().count();

        Ok(Extraction {
            text: Some(text),
            metadata: serde_json::json!({
                "char_count": char_count,
                "line_count": line_count,
            }),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true) // No external dependencies
    }

    fn name(&self) -> &str {
        "text_native"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extracts_text_with_counts() {
        let extraction = TextExtractor
            .extract(b"Hello, world!\nLine two.", "text/plain")
            .await
            .unwrap();

        assert_eq!(extraction.text.as_deref(), Some("Hello, world!\nLine two."));
        assert_eq!(extraction.metadata["char_count"], 23);
        assert_eq!(extraction.metadata["line_count"], 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let extraction = TextExtractor.extract(b"", "text/plain").await.unwrap();
        assert_eq!(extraction.text.as_deref(), Some(""));
        assert_eq!(extraction.metadata["line_count"], 0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_lossy() {
        let data: &[u8] = &[0xFF, 0xFE, b'h', b'i'];
        let extraction = TextExtractor.extract(data, "text/plain").await.unwrap();
        let text = extraction.text.unwrap();
        assert!(text.contains("hi"));
        assert!(text.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_idempotent_on_identical_bytes() {
        let data = b"same bytes every time";
        let a = TextExtractor.extract(data, "text/plain").await.unwrap();
        let b = TextExtractor.extract(data, "text/plain").await.unwrap();
        assert_eq!(a.text, b.text);
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(TextExtractor.health_check().await.unwrap());
    }
}
