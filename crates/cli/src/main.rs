//! PRONTO QA runner - Main Entry Point
//!
//! Runs the full order lifecycle against a PRONTO deployment and exits
//! 0 when the cycle completed with no findings, 1 when findings were
//! recorded, and 2 when the harness itself failed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use pronto_qa_harness::{CreationMode, HarnessConfig, WorkflowCoordinator};

mod output;

/// PRONTO QA - multi-actor order lifecycle harness
#[derive(Parser)]
#[command(name = "pronto-qa")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Customer-facing app base URL
    #[arg(long, env = "PRONTO_CLIENT_URL")]
    client_url: Option<String>,

    /// Staff-facing app base URL
    #[arg(long, env = "PRONTO_STAFF_URL")]
    staff_url: Option<String>,

    /// Backend API base URL
    #[arg(long, env = "PRONTO_API_URL")]
    api_url: Option<String>,

    /// How the shared order is created
    #[arg(long, value_enum)]
    creation_mode: Option<CreationModeArg>,

    /// Show the browser windows instead of running headless
    #[arg(long)]
    headed: bool,

    /// Pause after each browser interaction, in milliseconds
    #[arg(long)]
    slow_mo_ms: Option<u64>,

    /// Whole-run timeout in seconds
    #[arg(long)]
    run_timeout_secs: Option<u64>,

    /// Directory the JSON run report is written to
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table")]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CreationModeArg {
    Ui,
    Api,
}

fn build_config(cli: &Cli) -> anyhow::Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(url) = &cli.client_url {
        config.client_url = url.clone();
    }
    if let Some(url) = &cli.staff_url {
        config.staff_url = url.clone();
    }
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(mode) = cli.creation_mode {
        config.creation = match mode {
            CreationModeArg::Ui => CreationMode::Ui,
            CreationModeArg::Api => CreationMode::Api,
        };
    }
    if cli.headed {
        config.browser.headless = false;
    }
    if let Some(ms) = cli.slow_mo_ms {
        config.browser.slow_mo_ms = ms;
    }
    if let Some(secs) = cli.run_timeout_secs {
        config.timeouts.run_secs = secs;
    }
    if let Some(dir) = &cli.output {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&format!("invalid configuration: {e:#}"));
            return ExitCode::from(2);
        }
    };

    let coordinator = match WorkflowCoordinator::new(config) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            output::print_error(&format!("harness setup failed: {e}"));
            return ExitCode::from(2);
        }
    };

    match coordinator.run_full_cycle().await {
        Ok(report) => {
            output::print_report(&report, cli.format);
            if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            output::print_error(&format!("run aborted: {e}"));
            ExitCode::from(2)
        }
    }
}
