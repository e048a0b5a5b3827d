//! Command line entry point

use anyhow::Context;
use avsync_batch::{BatchController, Config, GradioClient, ProcessingRequest};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

/// Exit code when the batch ran but at least one pair failed
const EXIT_ITEM_FAILURES: i32 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "avsync-batch",
    version,
    about = "Submit video/audio pairs to a remote generation service in batch"
)]
struct Cli {
    /// YAML configuration file
    #[arg(long, short, env = "AVSYNC_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Process a single video instead of the configured batch (requires --audio)
    #[arg(long, requires = "audio")]
    video: Option<PathBuf>,

    /// Audio track for --video
    #[arg(long, requires = "video")]
    audio: Option<PathBuf>,

    /// Print the planned pairs and exit
    #[arg(long)]
    dry_run: bool,

    /// Exit with status 2 if any pair failed
    #[arg(long)]
    fail_on_error: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter_layer).init();

    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let client = Arc::new(GradioClient::from_config(&config).context("building service client")?);
    let controller = BatchController::new(config, client)
        .await
        .context("preparing working directories")?;

    let requests = match (cli.video, cli.audio) {
        (Some(video), Some(audio)) => vec![ProcessingRequest::new(video, audio)],
        _ => controller
            .plan_requests()
            .await
            .context("listing input directories")?,
    };

    if cli.dry_run {
        for (index, request) in requests.iter().enumerate() {
            println!(
                "{:>4}  {}  +  {}",
                index + 1,
                request.video_path.display(),
                request.audio_path.display()
            );
        }
        println!("{} pair(s) planned", requests.len());
        return Ok(());
    }

    let report = controller.run(requests).await.context("running batch")?;

    for entry in report.entries.iter().filter(|e| !e.is_success()) {
        println!(
            "FAILED  {} + {}: {}",
            entry.request.video_path.display(),
            entry.request.audio_path.display(),
            entry.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!(
        "{} of {} pair(s) succeeded, {} failed",
        report.succeeded, report.total, report.failed
    );
    if let Some(path) = &report.run_log_path {
        println!("run log: {}", path.display());
    }

    if cli.fail_on_error && report.failed > 0 {
        std::process::exit(EXIT_ITEM_FAILURES);
    }
    Ok(())
}
