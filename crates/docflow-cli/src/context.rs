//! Pipeline wiring for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::debug;
use walkdir::WalkDir;

use docflow_core::{GenerationBackend, VectorIndex};
use docflow_index::MemoryVectorIndex;
use docflow_inference::{Classifier, EmbeddingChain, OllamaBackend, Summarizer};
use docflow_jobs::{
    DocumentJobHandler, DocumentProcessor, ExtractionRegistry, Scheduler, SchedulerConfig,
};
use docflow_store::MemoryStore;

/// Everything a command needs, wired once.
///
/// The scheduler, store, and processor are explicit dependencies; commands
/// receive them from here rather than reaching for globals.
pub struct AppContext {
    pub store: MemoryStore,
    pub registry: Arc<ExtractionRegistry>,
    pub chain: Arc<EmbeddingChain>,
    pub index: Arc<MemoryVectorIndex>,
    pub scheduler: Arc<Scheduler>,
    pub handler: Arc<DocumentJobHandler>,
}

impl AppContext {
    /// Build the pipeline from environment configuration.
    pub fn from_env(ocr: bool) -> Result<Self> {
        let ocr_enabled = ocr
            || std::env::var("OCR_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false);

        let store = MemoryStore::new();
        let registry = Arc::new(ExtractionRegistry::with_defaults(ocr_enabled));
        let chain = Arc::new(EmbeddingChain::from_env().context("Building embedding chain")?);
        let index = Arc::new(MemoryVectorIndex::new(chain.dimension()));

        // Generation (summary/classification) is optional; the deterministic
        // fallbacks carry those stages when no backend is reachable.
        let gen_backend: Option<Arc<dyn GenerationBackend>> = std::env::var("OLLAMA_URL")
            .ok()
            .map(|_| Arc::new(OllamaBackend::from_env()) as Arc<dyn GenerationBackend>);

        let processor = Arc::new(DocumentProcessor::new(
            registry.clone(),
            chain.clone(),
            Arc::new(Summarizer::new(gen_backend.clone())),
            Arc::new(Classifier::new(gen_backend.clone())),
            Some(index.clone() as Arc<dyn VectorIndex>),
        ));

        let scheduler = Arc::new(Scheduler::new(
            Arc::new(store.clone()),
            SchedulerConfig::from_env(),
        ));
        let handler = Arc::new(DocumentJobHandler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            processor,
        ));

        debug!(
            backends = ?chain.backend_names(),
            dimension = chain.dimension(),
            ocr_enabled,
            "Pipeline wired"
        );

        Ok(Self {
            store,
            registry,
            chain,
            index,
            scheduler,
            handler,
        })
    }
}

/// Collect candidate files under a path.
pub fn collect_files(path: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("No such file or directory: {}", path.display());
    }

    let depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .max_depth(depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    Ok(files)
}

/// Declared media type for a file: extension first, magic bytes second.
pub fn detect_media_type(path: &Path) -> String {
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .and_then(|ext| {
            Some(match ext.as_str() {
                "txt" | "text" | "log" => "text/plain",
                "md" | "markdown" => "text/markdown",
                "csv" => "text/csv",
                "html" | "htm" => "text/html",
                "pdf" => "application/pdf",
                "doc" => "application/msword",
                "docx" => {
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                }
                "png" => "image/png",
                "jpg" | "jpeg" => "image/jpeg",
                "tif" | "tiff" => "image/tiff",
                "bmp" => "image/bmp",
                "webp" => "image/webp",
                _ => return None,
            })
        });

    if let Some(media_type) = by_extension {
        return media_type.to_string();
    }

    // Fall back to magic-byte sniffing on the file head.
    if let Ok(head) = std::fs::read(path) {
        if let Some(kind) = infer::get(&head) {
            return kind.mime_type().to_string();
        }
        if std::str::from_utf8(&head).is_ok() {
            return "text/plain".to_string();
        }
    }
    "application/octet-stream".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_media_type_by_extension() {
        assert_eq!(detect_media_type(Path::new("a.txt")), "text/plain");
        assert_eq!(detect_media_type(Path::new("b.MD")), "text/markdown");
        assert_eq!(detect_media_type(Path::new("c.pdf")), "application/pdf");
        assert_eq!(detect_media_type(Path::new("d.jpeg")), "image/jpeg");
        assert_eq!(
            detect_media_type(Path::new("e.docx")),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
    }

    #[test]
    fn test_detect_media_type_utf8_fallback() {
        let mut file = tempfile::Builder::new().suffix(".unknown").tempfile().unwrap();
        file.write_all(b"just some text content").unwrap();
        assert_eq!(detect_media_type(file.path()), "text/plain");
    }

    #[test]
    fn test_detect_media_type_binary_fallback() {
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        file.write_all(&[0u8, 159, 146, 150, 255, 0, 1]).unwrap();
        assert_eq!(detect_media_type(file.path()), "application/octet-stream");
    }

    #[test]
    fn test_collect_files_flat_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/b.txt"), "b").unwrap();

        let flat = collect_files(dir.path(), false).unwrap();
        assert_eq!(flat.len(), 1);

        let recursive = collect_files(dir.path(), true).unwrap();
        assert_eq!(recursive.len(), 2);
    }

    #[test]
    fn test_collect_files_missing_path() {
        assert!(collect_files(Path::new("/definitely/not/here"), false).is_err());
    }
}
