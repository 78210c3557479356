//! TETHER CLI
//!
//! Sends commands to a device shell and analyzes the transcripts it leaves.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use std::path::{Path, PathBuf};
use tether_core::MarkerConfig;
use tether_driver::{
    CommandDriver, ConnectionTarget, DriverConfig, RecoveryCoordinator, RecoveryPolicy,
    SendOptions,
};
use tether_log::LogConfig;
use tether_replay::{write_summary, Analyzer, ReplayError, SummaryRenderer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "TETHER - device shell driver and transcript analyzer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a transcript and write its summary
    Analyze(AnalyzeArgs),
    /// Send commands to a device shell, recording a transcript
    Send(SendArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Path to the transcript
    #[arg(short, long)]
    log: PathBuf,
    /// Marker configuration (JSON)
    #[arg(short, long)]
    markers: Option<PathBuf>,
    /// Print the analysis as JSON instead of the report
    #[arg(long)]
    json: bool,
    /// Do not append the report to `<stem>_summary.log`
    #[arg(long)]
    no_summary_file: bool,
}

#[derive(Args)]
struct SendArgs {
    /// Device path (`path@baud`, default 115200) or `tcp://host:port`
    #[arg(short, long)]
    port: String,
    /// Command to send; repeat for a sequence
    #[arg(short = 'c', long = "command", required = true)]
    commands: Vec<String>,
    /// Idle prompt to wait for instead of the configured one
    #[arg(short, long)]
    terminator: Option<String>,
    /// Read timeout per attempt
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Transcript directory
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
    /// Transcript file stem (timestamp when absent)
    #[arg(short, long)]
    name: Option<String>,
    /// Marker configuration (JSON)
    #[arg(short, long)]
    markers: Option<PathBuf>,
    /// Classify error-coded responses as success
    #[arg(long)]
    tolerate_errors: bool,
    /// Reopen the link after a hang
    #[arg(long)]
    recover: bool,
    /// Echo transcript entries to the console
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether=info")),
        )
        .init();

    match cli.command {
        Commands::Analyze(args) => analyze(&args),
        Commands::Send(args) => send(&args).await,
    }
}

fn load_markers(path: Option<&Path>) -> Result<MarkerConfig> {
    match path {
        Some(path) => Ok(MarkerConfig::from_json_file(path)?),
        None => Ok(MarkerConfig::default()),
    }
}

fn analyze(args: &AnalyzeArgs) -> Result<()> {
    let markers = load_markers(args.markers.as_deref())?;
    let analyzer = Analyzer::new(&markers)?;

    let result = match analyzer.analyze_file(&args.log) {
        Ok(result) => result,
        Err(err @ ReplayError::NotFound { .. }) => {
            println!("{}", SummaryRenderer::render_failure());
            if !args.no_summary_file {
                write_summary(None, &args.log)?;
            }
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", SummaryRenderer::render(&result));
    }
    if !args.no_summary_file {
        let path = write_summary(Some(&result), &args.log)?;
        info!(path = %path.display(), "summary written");
    }
    Ok(())
}

fn driver_config(args: &SendArgs, markers: &MarkerConfig) -> DriverConfig {
    let mut config = DriverConfig::from_markers(markers);
    if let Some(terminator) = &args.terminator {
        config = config.with_terminator(terminator.clone());
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config = config.with_read_timeout(timeout_ms);
    }
    config
}

async fn send(args: &SendArgs) -> Result<()> {
    let markers = load_markers(args.markers.as_deref())?;
    let target: ConnectionTarget = args.port.parse()?;
    let mut driver = CommandDriver::connect(target, driver_config(args, &markers)).await?;

    let mut log = LogConfig::new(args.log_dir.clone()).with_echo(args.verbose);
    if let Some(name) = &args.name {
        log = log.with_name(name.clone());
    }
    let transcript = driver.start_transcript(&log)?;

    let mut options = SendOptions::new();
    if args.tolerate_errors {
        options = options.tolerate_error_markers();
    }
    let mut coordinator = args
        .recover
        .then(|| RecoveryCoordinator::new(RecoveryPolicy::default()));

    for command in &args.commands {
        let classification = driver.send_with(command, &options).await?;
        println!("{command}: {classification}");
        if let Some(coordinator) = coordinator.as_mut() {
            if classification.needs_recovery() {
                coordinator.recover(&mut driver).await?;
            }
        }
    }

    driver.stop_transcript();
    driver.close().await?;
    info!(path = %transcript.display(), "transcript closed");
    Ok(())
}
