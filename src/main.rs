//! Crypto Portfolio Alerts - Main Entry Point
//!
//! Runs the take-profit / stop-loss evaluator on a fixed schedule.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crypto_portfolio_alerts::config::load_config;
use crypto_portfolio_alerts::Tracker;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Run a single evaluation pass and exit
    #[arg(long)]
    once: bool,
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
    } else {
        builder.try_init().map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = load_config(Some(&args.config)).context("loading configuration")?;
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    init_logging(&level, args.log_json)?;

    info!("Starting crypto portfolio alerts");
    info!("Configuration file: {}", args.config);

    let tracker = Tracker::from_config(&config).context("building tracker")?;
    let evaluator = tracker.evaluator().clone();

    if args.once {
        let report = evaluator.run_pass().await?;
        info!("Single pass finished: {:?}", report);
        return Ok(());
    }

    let interval = config.alerts.check_interval();
    info!("Checking alerts every {:?}", interval);

    tokio::select! {
        _ = evaluator.run_periodic(interval) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received shutdown signal, cleaning up...");
        }
    }

    Ok(())
}
