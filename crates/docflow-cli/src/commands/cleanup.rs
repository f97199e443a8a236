//! `docflow cleanup`: purge terminal jobs older than a threshold.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;

use crate::cli::CleanupArgs;
use crate::context::AppContext;

pub async fn handle_cleanup(args: CleanupArgs) -> Result<ExitCode> {
    let ctx = AppContext::from_env(false)?;

    let age = Duration::from_secs(args.older_than * 3600);
    let removed = ctx.scheduler.cleanup_older_than(age).await?;
    println!(
        "Removed {} terminal job(s) older than {}h",
        removed, args.older_than
    );

    Ok(ExitCode::SUCCESS)
}
