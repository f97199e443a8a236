//! PDF text extractor using `pdftotext` (poppler-utils).

use std::io::Write;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

use docflow_core::defaults::{
    EXTRACTION_CMD_TIMEOUT_SECS, LARGE_PDF_PAGE_THRESHOLD, PDF_BATCH_PAGES,
};
use docflow_core::{Error, Extraction, Extractor, Result};

use super::run_cmd_with_timeout;

/// Extracts text from PDFs via `pdftotext`, with `pdfinfo` metadata.
///
/// Large PDFs (> 100 pages) are extracted in 50-page batches to bound memory
/// usage. Each invocation is guarded by a per-command timeout. Near-empty
/// output on a multi-page PDF sets `metadata["needs_ocr"]` as a hint that the
/// file is scanned.
pub struct PdfExtractor;

/// Parse `pdfinfo` output into a JSON metadata object.
fn parse_pdfinfo(output: &str) -> JsonValue {
    let mut metadata = serde_json::Map::new();

    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase().replace(' ', "_");
            let value = value.trim();
            if !value.is_empty() {
                if key == "pages" {
                    if let Ok(pages) = value.parse::<u64>() {
                        metadata.insert("page_count".to_string(), JsonValue::Number(pages.into()));
                        continue;
                    }
                }
                metadata.insert(key, JsonValue::String(value.to_string()));
            }
        }
    }

    JsonValue::Object(metadata)
}

fn page_count(metadata: &JsonValue) -> usize {
    metadata
        .get("page_count")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as usize
}

#[async_trait]
impl Extractor for PdfExtractor {
    async fn extract(&self, data: &[u8], _media_type: &str) -> Result<Extraction> {
        if data.is_empty() {
            return Err(Error::Extraction(
                "Cannot extract text from empty PDF data".to_string(),
            ));
        }

        // Validate PDF magic bytes (%PDF)
        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::Extraction(
                "Not a valid PDF (missing %PDF header)".to_string(),
            ));
        }

        // pdftotext reads from a file path; the source bytes stay untouched.
        let mut tmpfile = NamedTempFile::new()
            .map_err(|e| Error::Extraction(format!("Failed to create temp file: {}", e)))?;
        tmpfile
            .write_all(data)
            .map_err(|e| Error::Extraction(format!("Failed to write temp file: {}", e)))?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let pdfinfo_output = run_cmd_with_timeout(
            Command::new("pdfinfo").arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await;

        let mut metadata = match pdfinfo_output {
            Ok(output) => parse_pdfinfo(&output),
            Err(e) => {
                warn!(error = %e, "pdfinfo failed, continuing without metadata");
                serde_json::json!({})
            }
        };

        let pages = page_count(&metadata);
        let text = if pages > LARGE_PDF_PAGE_THRESHOLD {
            debug!(pages, "Large PDF detected, extracting in batches");
            let mut chunks = Vec::new();
            let mut start = 1usize;
            while start <= pages {
                let end = (start + PDF_BATCH_PAGES - 1).min(pages);
                let chunk = run_cmd_with_timeout(
                    Command::new("pdftotext")
                        .arg("-f")
                        .arg(start.to_string())
                        .arg("-l")
                        .arg(end.to_string())
                        .arg(&tmp_path)
                        .arg("-"),
                    EXTRACTION_CMD_TIMEOUT_SECS,
                )
                .await?;
                chunks.push(chunk);
                start = end + 1;
            }
            chunks.join("")
        } else {
            run_cmd_with_timeout(
                Command::new("pdftotext").arg(&tmp_path).arg("-"),
                EXTRACTION_CMD_TIMEOUT_SECS,
            )
            .await?
        };

        if let Some(obj) = metadata.as_object_mut() {
            // Scanned PDFs have pages but no text layer worth keeping.
            if text.trim().len() < 50 && pages > 0 {
                obj.insert("needs_ocr".to_string(), JsonValue::Bool(true));
            }
            obj.insert("char_count".to_string(), JsonValue::Number(text.len().into()));
            obj.insert(
                "line_count".to_string(),
                JsonValue::Number(text.lines().count().into()),
            );
        }

        Ok(Extraction {
            text: Some(text),
            metadata,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("pdftotext").arg("-v").output().await {
            Ok(output) => {
                // pdftotext -v prints version to stderr and exits with 0 or 99
                // depending on the version. Both indicate the binary exists.
                Ok(output.status.success() || output.status.code() == Some(99))
            }
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}
