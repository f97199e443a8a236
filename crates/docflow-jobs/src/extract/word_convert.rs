//! Word document extractor using `pandoc`.

use std::io::Write;

use async_trait::async_trait;
use tokio::process::Command;

use docflow_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use docflow_core::{Error, Extraction, Extractor, Result};

use super::run_cmd_with_timeout;

/// Converts Word documents (legacy `.doc` and OOXML `.docx`) to plain text
/// via `pandoc`.
pub struct WordExtractor;

/// File extension pandoc needs to pick the right reader.
fn suffix_for(media_type: &str) -> &'static str {
    if media_type.contains("openxmlformats") {
        ".docx"
    } else {
        ".doc"
    }
}

#[async_trait]
impl Extractor for WordExtractor {
    async fn extract(&self, data: &[u8], media_type: &str) -> Result<Extraction> {
        if data.is_empty() {
            return Err(Error::Extraction(
                "Cannot extract text from empty document data".to_string(),
            ));
        }

        let mut tmpfile = tempfile::Builder::new()
            .suffix(suffix_for(media_type))
            .tempfile()
            .map_err(|e| Error::Extraction(format!("Failed to create temp file: {}", e)))?;
        tmpfile
            .write_all(data)
            .map_err(|e| Error::Extraction(format!("Failed to write temp file: {}", e)))?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let text = run_cmd_with_timeout(
            Command::new("pandoc").arg("-t").arg("plain").arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        let char_count = text.len();
        let line_count = text.lines().count();

        Ok(Extraction {
            text: Some(text),
            metadata: serde_json::json!({
                "char_count": char_count,
                "line_count": line_count,
                "converter": "pandoc",
            }),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("pandoc").arg("--version").output().await {
            Ok(output) => Ok(output.status.success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "word_convert"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_selection() {
        assert_eq!(suffix_for("application/msword"), ".doc");
        assert_eq!(
            suffix_for("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            ".docx"
        );
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let err = WordExtractor
            .extract(b"", "application/msword")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[tokio::test]
    async fn test_health_check_does_not_error() {
        assert!(WordExtractor.health_check().await.is_ok());
    }
}
