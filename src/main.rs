//! logfold - consolidates date-stamped rotating log files.
//!
//! Tails every file in a directory that matches the configured pattern and
//! appends newly written bytes to one consolidated file, remembering per-file
//! offsets across restarts.
//!
//! # Commands
//!
//! - `logfold run <DIR>`: scan on a fixed interval until terminated
//! - `logfold once <DIR>`: perform a single scan, then exit
//!
//! # Environment Variables
//!
//! See the [`logfold::config`] module for available configuration options.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use logfold::config::{Config, Overrides};
use logfold::monitor::Monitor;

/// logfold - rotating log file consolidator.
///
/// Watches a directory of date-stamped log files and folds their growth into
/// a single append-only output file.
#[derive(Parser, Debug)]
#[command(name = "logfold")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    LOGFOLD_OUTPUT_FILE        Destination filename (default: consolidated.log)
    LOGFOLD_STATE_FILE         Offset state document (default: logfold-state.json)
    LOGFOLD_LOG_PATTERN        Source filename glob (default: ADSI*.log)
    LOGFOLD_DATE_PATTERN       Regex extracting the date from a filename
    LOGFOLD_DATE_FORMAT        chrono format parsing the extracted date
    LOGFOLD_RETENTION_DAYS     Look-back window in days (default: 30)
    LOGFOLD_POLL_INTERVAL_SECS Seconds between scans (default: 60)
    LOGFOLD_MAX_RETRY_ATTEMPTS Append retry attempts, 1-10 (default: 3)
    LOGFOLD_RETRY_DELAY_MS     Delay between append retries (default: 150)
    LOGFOLD_FILE_ENCODING      Text encoding label (default: utf-8)

EXAMPLES:
    # Consolidate ADSI logs once
    logfold once /var/log/adsi

    # Poll every 30 seconds with a two-week retention window
    logfold run /var/log/adsi --interval 30 --retention-days 14

    # A different rotation scheme
    export LOGFOLD_DATE_PATTERN='^app-(\\d{4}-\\d{2}-\\d{2})\\.log$'
    export LOGFOLD_DATE_FORMAT='%Y-%m-%d'
    logfold run /var/log/app --pattern 'app-*.log'
")]
struct Cli {
    /// Raise log verbosity to debug.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable ANSI colors in log output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the source directory on a fixed interval until terminated.
    Run(ScanArgs),

    /// Perform a single scan, then exit.
    Once(ScanArgs),
}

/// Arguments shared by the scanning subcommands.
#[derive(Args, Debug)]
struct ScanArgs {
    /// Directory containing the rotating source log files.
    source_dir: PathBuf,

    /// Destination filename, resolved inside the source directory unless absolute.
    #[arg(short, long)]
    output: Option<String>,

    /// Source filename glob (`*` and `?`).
    #[arg(short, long)]
    pattern: Option<String>,

    /// Retention window in days.
    #[arg(short, long)]
    retention_days: Option<u32>,

    /// Seconds between scans.
    #[arg(short, long)]
    interval: Option<u64>,
}

impl ScanArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            output_file: self.output.clone(),
            log_pattern: self.pattern.clone(),
            retention_days: self.retention_days,
            poll_interval_secs: self.interval,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, !cli.no_color);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match cli.command {
        Command::Run(args) => runtime.block_on(run_monitor(args)),
        Command::Once(args) => runtime.block_on(run_single_scan(args)),
    }
}

/// Runs the polling monitor until a shutdown signal arrives.
async fn run_monitor(args: ScanArgs) -> Result<()> {
    let overrides = args.overrides();
    let config =
        Config::load(args.source_dir, &overrides).context("Failed to load configuration")?;

    info!(
        source_dir = %config.source_dir.display(),
        output = %config.output_path.display(),
        pattern = %config.log_pattern,
        retention_days = config.retention_days,
        interval_secs = config.poll_interval.as_secs(),
        "Configuration loaded"
    );

    let mut monitor = Monitor::new(config);
    monitor.run(wait_for_shutdown()).await;

    info!("Monitor stopped");
    Ok(())
}

/// Runs exactly one scan.
async fn run_single_scan(args: ScanArgs) -> Result<()> {
    let overrides = args.overrides();
    let config =
        Config::load(args.source_dir, &overrides).context("Failed to load configuration")?;

    let mut monitor = Monitor::new(config);
    let summary = monitor.run_once().await.context("Scan failed")?;

    info!(
        processed = summary.processed,
        new_files = summary.new_files,
        appended_bytes = summary.appended_bytes,
        "Scan complete"
    );
    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(verbose: bool, ansi: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
