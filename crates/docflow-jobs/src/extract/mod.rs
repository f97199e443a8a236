//! Format extractors, one per supported media type family.

mod image_ocr;
mod pdf_text;
mod text_native;
mod word_convert;

pub use image_ocr::OcrExtractor;
pub use pdf_text::PdfExtractor;
pub use text_native::TextExtractor;
pub use word_convert::WordExtractor;

use std::time::Duration;

use docflow_core::{Error, Result};
use tokio::process::Command;

/// Run an external command with a timeout, returning stdout as a string.
pub(crate) async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::Extraction(format!("External command timed out after {}s", timeout_secs))
        })?
        .map_err(|e| Error::Extraction(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
