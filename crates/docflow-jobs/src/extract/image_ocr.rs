//! Image OCR extractor: preprocess with the `image` crate, recognize with
//! `tesseract`.

use async_trait::async_trait;
use image::{DynamicImage, GrayImage};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use docflow_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use docflow_core::{Error, Extraction, Extractor, Result};

use super::run_cmd_with_timeout;

/// OCR pipeline for image formats.
///
/// Preprocessing (grayscale → levels normalization → sharpen) is written to a
/// derived temporary PNG; the source bytes are never modified. Recognition
/// runs `tesseract` on the derived artifact with a per-command timeout.
pub struct OcrExtractor {
    language: String,
}

impl OcrExtractor {
    pub fn new() -> Self {
        Self {
            language: std::env::var("OCR_LANGUAGE").unwrap_or_else(|_| "eng".to_string()),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

impl Default for OcrExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Stretch grayscale levels to the full 0–255 range.
fn normalize_levels(gray: &mut GrayImage) {
    let (mut min, mut max) = (u8::MAX, u8::MIN);
    for pixel in gray.pixels() {
        min = min.min(pixel[0]);
        max = max.max(pixel[0]);
    }
    if max > min {
        let range = (max - min) as f32;
        for pixel in gray.pixels_mut() {
            pixel[0] = (((pixel[0] - min) as f32 / range) * 255.0).round() as u8;
        }
    }
}

/// Grayscale, normalize, and sharpen an image for recognition.
fn preprocess(img: DynamicImage) -> DynamicImage {
    let mut gray = img.to_luma8();
    normalize_levels(&mut gray);
    DynamicImage::ImageLuma8(gray).unsharpen(1.0, 2)
}

#[async_trait]
impl Extractor for OcrExtractor {
    async fn extract(&self, data: &[u8], media_type: &str) -> Result<Extraction> {
        if data.is_empty() {
            return Err(Error::Extraction(
                "Cannot run OCR on empty image data".to_string(),
            ));
        }

        let img = image::load_from_memory(data).map_err(|e| {
            Error::Extraction(format!("Failed to decode {}: {}", media_type, e))
        })?;
        let (width, height) = (img.width(), img.height());

        // Preprocess into a derived artifact; the original bytes stay as-is.
        let workdir = TempDir::new()
            .map_err(|e| Error::Extraction(format!("Failed to create temp dir: {}", e)))?;
        let input_path = workdir.path().join("preprocessed.png");
        preprocess(img)
            .save(&input_path)
            .map_err(|e| Error::Extraction(format!("Failed to write derived image: {}", e)))?;

        debug!(width, height, language = %self.language, "Running OCR");

        // tesseract INPUT OUTPUT_BASE -l LANG writes OUTPUT_BASE.txt
        let output_base = workdir.path().join("recognized");
        run_cmd_with_timeout(
            Command::new("tesseract")
                .arg(&input_path)
                .arg(&output_base)
                .arg("-l")
                .arg(&self.language),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        let output_path = output_base.with_extension("txt");
        let text = tokio::fs::read_to_string(&output_path)
            .await
            .map_err(|e| Error::Extraction(format!("Failed to read OCR output: {}", e)))?;
        let text = text.trim_end().to_string();

        Ok(Extraction {
            metadata: serde_json::json!({
                "width": width,
                "height": height,
                "language": self.language,
                "char_count": text.len(),
                "engine": "tesseract",
            }),
            text: Some(text),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("tesseract").arg("--version").output().await {
            Ok(output) => Ok(output.status.success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "image_ocr"
    }
}
