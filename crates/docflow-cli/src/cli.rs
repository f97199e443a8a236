//! Argument definitions for the `docflow` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use docflow_core::{defaults, StageFlags};

/// Document processing pipeline: extraction, embeddings, summaries, and
/// classification over a queue of retryable background jobs.
#[derive(Debug, Parser)]
#[command(name = "docflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (overrides RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Process files synchronously; exit 0 only if every file succeeds
    Process(ProcessArgs),

    /// Enqueue files for processing without waiting
    Queue(QueueArgs),

    /// Print aggregate counts for documents, jobs, and queues
    Status,

    /// Exercise each extractor, provider, and queue; report pass/fail
    Test,

    /// Purge terminal jobs older than a threshold
    Cleanup(CleanupArgs),
}

/// Stage selection shared by `process` and `queue`.
#[derive(Debug, Clone, Copy, Args)]
pub struct StageArgs {
    /// Extract plain text
    #[arg(long)]
    pub extract_text: bool,

    /// Derive structural metadata (page count, pixel dimensions)
    #[arg(long)]
    pub extract_metadata: bool,

    /// Generate an embedding vector
    #[arg(long)]
    pub generate_embeddings: bool,

    /// Generate a summary
    #[arg(long)]
    pub summarize: bool,

    /// Classify into a document category
    #[arg(long)]
    pub classify: bool,

    /// Fail the document on any stage error
    #[arg(long)]
    pub strict: bool,
}

impl StageArgs {
    /// Resolve to stage flags; with no stage selected, all stages run.
    pub fn to_flags(self) -> StageFlags {
        let flags = StageFlags {
            extract_text: self.extract_text,
            extract_metadata: self.extract_metadata,
            generate_embeddings: self.generate_embeddings,
            generate_summary: self.summarize,
            classify_document: self.classify,
            strict: self.strict,
        };
        if flags.any() {
            flags
        } else {
            StageFlags {
                strict: self.strict,
                ..StageFlags::all()
            }
        }
    }
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// File or directory to process
    pub path: PathBuf,

    /// Recurse into subdirectories
    #[arg(long, short = 'r')]
    pub recursive: bool,

    /// Concurrent document workers
    #[arg(long, default_value_t = defaults::DOCUMENT_QUEUE_CONCURRENCY)]
    pub concurrency: usize,

    /// Enable OCR for image formats
    #[arg(long)]
    pub ocr: bool,

    /// Send a notification to this address per document
    #[arg(long, value_name = "ADDR")]
    pub notify_email: Option<String>,

    #[command(flatten)]
    pub stages: StageArgs,
}

#[derive(Debug, Args)]
pub struct QueueArgs {
    /// File or directory to enqueue
    pub path: PathBuf,

    /// Recurse into subdirectories
    #[arg(long, short = 'r')]
    pub recursive: bool,

    /// Job priority (1 = most urgent)
    #[arg(long, default_value_t = defaults::PRIORITY_DEFAULT,
          value_parser = clap::value_parser!(i32).range(1..=10))]
    pub priority: i32,

    /// Enable OCR for image formats
    #[arg(long)]
    pub ocr: bool,

    #[command(flatten)]
    pub stages: StageArgs,
}

#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Age threshold in hours
    #[arg(long = "older-than", value_name = "HOURS",
          default_value_t = defaults::CLEANUP_OLDER_THAN_HOURS)]
    pub older_than: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_process() {
        let cli = Cli::try_parse_from([
            "docflow",
            "process",
            "/tmp/docs",
            "--recursive",
            "--concurrency",
            "5",
            "--extract-text",
            "--classify",
            "--notify-email",
            "ops@example.com",
        ])
        .unwrap();

        let Commands::Process(args) = cli.command else {
            panic!("Expected process command");
        };
        assert!(args.recursive);
        assert_eq!(args.concurrency, 5);
        assert_eq!(args.notify_email.as_deref(), Some("ops@example.com"));

        let flags = args.stages.to_flags();
        assert!(flags.extract_text);
        assert!(flags.classify_document);
        assert!(!flags.generate_embeddings);
    }

    #[test]
    fn test_no_stage_flags_means_all_stages() {
        let cli = Cli::try_parse_from(["docflow", "process", "/tmp/a.txt"]).unwrap();
        let Commands::Process(args) = cli.command else {
            panic!("Expected process command");
        };
        let flags = args.stages.to_flags();
        assert!(flags.extract_text);
        assert!(flags.generate_embeddings);
        assert!(flags.generate_summary);
        assert!(flags.classify_document);
        assert!(!flags.strict);
    }

    #[test]
    fn test_queue_priority_bounds() {
        assert!(Cli::try_parse_from(["docflow", "queue", "/tmp/a", "--priority", "0"]).is_err());
        assert!(Cli::try_parse_from(["docflow", "queue", "/tmp/a", "--priority", "11"]).is_err());

        let cli = Cli::try_parse_from(["docflow", "queue", "/tmp/a", "--priority", "1"]).unwrap();
        let Commands::Queue(args) = cli.command else {
            panic!("Expected queue command");
        };
        assert_eq!(args.priority, 1);
    }

    #[test]
    fn test_cleanup_default_threshold() {
        let cli = Cli::try_parse_from(["docflow", "cleanup"]).unwrap();
        let Commands::Cleanup(args) = cli.command else {
            panic!("Expected cleanup command");
        };
        assert_eq!(args.older_than, defaults::CLEANUP_OLDER_THAN_HOURS);
    }
}
