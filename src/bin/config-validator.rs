//! # Work Queue Configuration Validator
//!
//! Command-line tool for validating work queue configuration files across
//! environments. Catches bad capacities, names and backoff windows before a
//! pipeline starts.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use workqueue_core::config::ConfigManager;
use workqueue_core::monitoring::ChannelHealthStatus;
use workqueue_core::WorkQueueConfig;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate work queue configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: $WORKQUEUE_CONFIG_DIR or ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Serialize)]
struct ValidationSummary<'a> {
    environment: &'a str,
    config_directory: String,
    valid: bool,
    config: &'a WorkQueueConfig,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    match validate(&cli) {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            if cli.format == OutputFormat::Table {
                println!("Configuration is invalid: {e:#}");
            } else {
                let failure = serde_json::json!({
                    "environment": cli.environment,
                    "valid": false,
                    "error": format!("{e:#}"),
                });
                println!("{failure}");
            }
            process::exit(1);
        }
    }
}

fn validate(cli: &Cli) -> anyhow::Result<()> {
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .with_context(|| format!("loading configuration for '{}'", cli.environment))?;

    match cli.format {
        OutputFormat::Table => print_table(&manager),
        OutputFormat::Json => {
            let summary = ValidationSummary {
                environment: manager.environment(),
                config_directory: manager.config_directory().display().to_string(),
                valid: true,
                config: manager.config(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

fn print_table(manager: &ConfigManager) {
    let config = manager.config();
    let fmt_timeout = |ms: Option<u64>| ms.map_or_else(|| "none".to_string(), |ms| format!("{ms}ms"));

    println!("Validating work queue configuration");
    println!("Environment:      {}", manager.environment());
    println!("Config Directory: {}", manager.config_directory().display());
    println!();
    println!("Queue");
    println!("  name:        {}", config.queue.name);
    println!("  capacity:    {}", config.queue.capacity);
    println!("  put timeout: {}", fmt_timeout(config.queue.put_timeout_ms));
    println!("  get timeout: {}", fmt_timeout(config.queue.get_timeout_ms));
    println!("Backoff");
    println!(
        "  delay window: {}ms - {}ms",
        config.backoff.min_delay_ms, config.backoff.max_delay_ms
    );
    println!("Pipeline");
    println!("  consumers:   {}", config.pipeline.consumers);

    // One termination message per consumer
    let fanout_saturation = config.pipeline.consumers as f64 / config.queue.capacity as f64;
    if ChannelHealthStatus::from_saturation(fanout_saturation) != ChannelHealthStatus::Healthy {
        println!(
            "  note: termination fan-out alone reaches {:.0}% saturation",
            fanout_saturation * 100.0
        );
    }

    println!();
    println!("All configuration validation checks passed");
}
