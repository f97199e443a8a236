//! `docflow queue`: enqueue without waiting.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use docflow_core::{Document, DocumentRepository, QueueName};

use crate::cli::QueueArgs;
use crate::context::{collect_files, detect_media_type, AppContext};

pub async fn handle_queue(args: QueueArgs) -> Result<ExitCode> {
    let ctx = AppContext::from_env(args.ocr)?;
    let files = collect_files(&args.path, args.recursive)?;
    if files.is_empty() {
        println!("No files found under {}", args.path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let flags = args.stages.to_flags();
    for file in &files {
        let size = tokio::fs::metadata(file).await.map(|m| m.len()).unwrap_or(0) as i64;
        let media_type = detect_media_type(file);
        let document = Document::new(&media_type, size);
        let document_id = document.id;
        ctx.store.save(document).await?;

        let payload = json!({
            "path": file,
            "media_type": media_type,
            "flags": flags,
        });
        let job_id = ctx
            .scheduler
            .enqueue(
                QueueName::DocumentProcessing,
                Some(document_id),
                Some(payload),
                args.priority,
                Duration::ZERO,
            )
            .await?;
        println!("queued  {}  job={} priority={}", file.display(), job_id, args.priority);
    }

    println!("\n{} job(s) enqueued on {}", files.len(), QueueName::DocumentProcessing);
    Ok(ExitCode::SUCCESS)
}
