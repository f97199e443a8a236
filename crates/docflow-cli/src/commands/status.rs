//! `docflow status`: aggregate counts for documents, jobs, and queues.

use std::process::ExitCode;

use anyhow::Result;

use docflow_core::{DocumentStatus, JobRepository, QueueName};

use crate::context::AppContext;

pub async fn handle_status() -> Result<ExitCode> {
    let ctx = AppContext::from_env(false)?;

    println!("Documents:");
    let counts = docflow_core::DocumentRepository::counts_by_status(&ctx.store).await?;
    for status in [
        DocumentStatus::Pending,
        DocumentStatus::Processing,
        DocumentStatus::Completed,
        DocumentStatus::Failed,
    ] {
        println!("  {:<12} {}", status.to_string(), counts.get(&status).copied().unwrap_or(0));
    }

    println!("\nQueues:");
    let mut totals = (0i64, 0i64, 0i64, 0i64, 0i64);
    for queue in QueueName::ALL {
        let stats = ctx.store.stats(queue).await?;
        println!(
            "  {:<22} waiting={} active={} completed={} failed={} delayed={}",
            queue.to_string(),
            stats.waiting,
            stats.active,
            stats.completed,
            stats.failed,
            stats.delayed
        );
        totals.0 += stats.waiting;
        totals.1 += stats.active;
        totals.2 += stats.completed;
        totals.3 += stats.failed;
        totals.4 += stats.delayed;
    }
    println!(
        "\nJobs total: waiting={} active={} completed={} failed={} delayed={}",
        totals.0, totals.1, totals.2, totals.3, totals.4
    );

    Ok(ExitCode::SUCCESS)
}
