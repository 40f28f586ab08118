use anyhow::{ensure, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use forks_sync::{Config, RunSummary, SyncEngine, SyncStatus};

#[derive(Parser)]
#[command(name = "forks-sync")]
#[command(about = "Keep your git forks up to date with their upstream default branches")]
#[command(version)]
struct Cli {
    /// GitHub personal access token (falls back to GITHUB_TOKEN)
    #[arg(short, long)]
    token: Option<String>,

    /// Force push changes to forked repos; without this flag the tool runs in dry mode
    #[arg(short, long)]
    force: bool,

    /// Number of forks to sync concurrently
    #[arg(long)]
    threads: Option<usize>,

    /// Seconds before a single git command times out
    #[arg(long)]
    timeout: Option<u64>,

    /// Location where forks and logs are stored
    #[arg(short, long)]
    location: Option<String>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;

    // Guard must live for the whole run so the file writer flushes on exit
    let _log_guard = init_logging(cli.verbose, &config)?;
    info!("Starting forks-sync v{}", env!("CARGO_PKG_VERSION"));

    let engine = SyncEngine::new(config);
    let summary = engine.run().await?;

    print_summary(&summary);

    Ok(())
}

/// Load configuration and apply CLI overrides on top of it
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    if cli.force {
        config.force = true;
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout = timeout;
    }
    if let Some(location) = &cli.location {
        config.location = location.clone();
    }

    config.expand_paths()?;

    ensure!(config.threads > 0, "threads must be at least 1");
    ensure!(config.timeout > 0, "timeout must be at least 1 second");

    Ok(config)
}

/// Initialize logging to console and a daily-rotating file under the
/// storage location
fn init_logging(
    verbose: bool,
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "forks.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .init();

    Ok(guard)
}

/// Print the human-facing run summary
fn print_summary(summary: &RunSummary) {
    println!("\n🎉 Forks Sync complete!");

    if summary.dry_run {
        println!("   🔍 Dry run - no git commands were executed (pass --force to push changes)");
    }

    println!("   📊 Forks processed: {}", summary.total_forks);
    println!(
        "   ✅ Successful operations: {}",
        summary.successful_operations
    );
    println!("   ❌ Failed operations: {}", summary.failed_operations);
    println!(
        "   ⏰ Timed-out operations: {}",
        summary.timed_out_operations
    );
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.failed_operations > 0 || summary.timed_out_operations > 0 {
        println!("\n🔍 Unsuccessful operations:");
        for outcome in &summary.outcomes {
            match &outcome.status {
                SyncStatus::Failed(detail) => {
                    println!("   ❌ {}: {}", outcome.repo, detail)
                }
                SyncStatus::TimedOut => println!("   ⏰ {}: timed out", outcome.repo),
                SyncStatus::Success => {}
            }
        }
    }
}
