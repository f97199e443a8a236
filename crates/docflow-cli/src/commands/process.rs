//! `docflow process`: synchronous pipeline run over local files.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tracing::info;

use docflow_core::{defaults, Document, DocumentRepository, JobStatus, LogNotifier, QueueName};
use docflow_jobs::NotificationHandler;

use crate::cli::ProcessArgs;
use crate::context::{collect_files, detect_media_type, AppContext};

pub async fn handle_process(args: ProcessArgs) -> Result<ExitCode> {
    let ctx = AppContext::from_env(args.ocr)?;
    let files = collect_files(&args.path, args.recursive)?;
    if files.is_empty() {
        println!("No files found under {}", args.path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let flags = args.stages.to_flags();
    info!(files = files.len(), concurrency = args.concurrency, "Starting synchronous run");

    ctx.scheduler
        .process(
            QueueName::DocumentProcessing,
            args.concurrency.max(1),
            ctx.handler.clone(),
        )
        .await?;
    ctx.scheduler
        .process(
            QueueName::Notification,
            defaults::NOTIFICATION_QUEUE_CONCURRENCY,
            Arc::new(NotificationHandler::new(Arc::new(LogNotifier))),
        )
        .await?;

    let mut submissions = Vec::new();
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
            "notify": args.notify_email,
        });
        let job_id = ctx
            .scheduler
            .enqueue(
                QueueName::DocumentProcessing,
                Some(document_id),
                Some(payload),
                defaults::PRIORITY_DEFAULT,
                Duration::ZERO,
            )
            .await?;
        submissions.push((file.clone(), document_id, job_id));
    }

    // Synchronous contract: wait for every job to reach a terminal state.
    loop {
        let mut all_terminal = true;
        for (_, _, job_id) in &submissions {
            all_terminal &= ctx.scheduler.status(*job_id).await?.state.is_terminal();
        }
        if all_terminal {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // Per-file report: every failure is listed, never dropped.
    let mut failures = 0usize;
    for (file, document_id, job_id) in &submissions {
        let report = ctx.scheduler.status(*job_id).await?;
        match report.state {
            JobStatus::Completed => {
                let document = ctx.store.load(*document_id).await?;
                let label = document
                    .classification
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("ok    {}  [{}]", file.display(), label);
            }
            _ => {
                failures += 1;
                println!(
                    "FAIL  {}  {}",
                    file.display(),
                    report.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
        }
    }

    // Give queued notifications a moment to drain before stopping.
    let drain_deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < drain_deadline {
        let stats = ctx.scheduler.stats(QueueName::Notification).await?;
        if stats.waiting + stats.active == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    ctx.scheduler
        .shutdown(Duration::from_secs(defaults::SHUTDOWN_GRACE_SECS))
        .await?;

    println!(
        "\n{} processed, {} failed",
        submissions.len() - failures,
        failures
    );
    Ok(if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
