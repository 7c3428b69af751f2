// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::MonitorConfig;

/// Fabstir model monitor CLI
#[derive(Parser, Debug)]
#[command(name = "model-monitor")]
#[command(version)]
#[command(
    about = "Offline drift, confidence and data-quality checks for deployed models",
    long_about = None
)]
pub struct Cli {
    /// TOML configuration file (MONITOR_* environment variables override it)
    #[arg(long, global = true, env = "MONITOR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare a production batch against a reference sample
    Drift(commands::DriftArgs),

    /// Validate JSON-lines request records against the configured schema
    Validate(commands::ValidateArgs),

    /// Summarize a list of confidence observations
    Confidence(commands::ConfidenceArgs),

    /// Print the effective configuration
    ShowConfig,
}

/// Configuration file (or defaults) with environment overrides applied
pub fn load_config(path: Option<&PathBuf>) -> Result<MonitorConfig> {
    let mut config = match path {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;

    let output = match cli.command {
        Commands::Drift(args) => commands::run_drift(&args, &config).await?,
        Commands::Validate(args) => commands::run_validate(&args, &config).await?,
        Commands::Confidence(args) => commands::run_confidence(&args, &config).await?,
        Commands::ShowConfig => {
            print!("{}", config.to_toml_string()?);
            return Ok(());
        }
    };

    println!("{}", serde_json::to_string_pretty(&output.report)?);
    if let Some(metrics) = output.metrics {
        println!("\n{}", metrics);
    }
    Ok(())
}
