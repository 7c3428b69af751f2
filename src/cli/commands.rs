// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::MonitorConfig;
use crate::metrics::PrometheusSink;
use crate::monitoring::{
    ConfidenceObservation, DriftDetector, DriftMethod, FeatureBatch, ReferenceDistribution,
};

/// Arguments for the drift command
#[derive(Args, Debug)]
pub struct DriftArgs {
    /// Reference sample: JSON object with `feature_names` and row-major `rows`
    #[arg(long)]
    pub reference: PathBuf,

    /// Production batch in the same format
    #[arg(long)]
    pub batch: PathBuf,

    /// Override the configured default method (ks, psi, js, chi2)
    #[arg(long)]
    pub method: Option<DriftMethod>,

    /// Override the configured significance threshold
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Also print the exported metrics in Prometheus text format
    #[arg(long)]
    pub prometheus: bool,
}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// File with one JSON record per line
    #[arg(long)]
    pub records: PathBuf,

    /// Also print the exported metrics in Prometheus text format
    #[arg(long)]
    pub prometheus: bool,
}

/// Arguments for the confidence command
#[derive(Args, Debug)]
pub struct ConfidenceArgs {
    /// JSON array of `{"confidence": f64, "is_correct": bool?}` objects
    #[arg(long)]
    pub input: PathBuf,

    /// Override the configured window size
    #[arg(long)]
    pub window_size: Option<usize>,

    /// Also print the exported metrics in Prometheus text format
    #[arg(long)]
    pub prometheus: bool,
}

/// Report produced by a command plus the optional metrics exposition
#[derive(Debug)]
pub struct CommandOutput {
    pub report: Value,
    pub metrics: Option<String>,
}

async fn read_input(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn metrics_text(sink: &PrometheusSink, enabled: bool) -> Result<Option<String>> {
    if !enabled {
        return Ok(None);
    }
    Ok(Some(sink.render()?))
}

/// Run every feature's drift test on a batch read from disk
pub async fn run_drift(args: &DriftArgs, config: &MonitorConfig) -> Result<CommandOutput> {
    let reference: FeatureBatch = serde_json::from_str(&read_input(&args.reference).await?)
        .context("Reference file is not a feature batch")?;
    let batch: FeatureBatch = serde_json::from_str(&read_input(&args.batch).await?)
        .context("Batch file is not a feature batch")?;

    let mut config = config.clone();
    if let Some(method) = args.method {
        config.drift.method = method;
    }
    if let Some(threshold) = args.threshold {
        config.drift.threshold = threshold;
    }

    let sink = Arc::new(PrometheusSink::new());
    let detector: DriftDetector = config.build_drift_detector(
        ReferenceDistribution::from_rows(&reference.rows)?,
        reference.feature_names.clone(),
        sink.clone(),
    )?;

    let results = detector.detect(&batch)?;
    let summary = DriftDetector::summarize(&results);
    info!(
        features = summary.total_features,
        drifted = summary.drifted_features,
        "Drift check complete"
    );

    Ok(CommandOutput {
        report: json!({ "results": results, "summary": summary }),
        metrics: metrics_text(&sink, args.prometheus)?,
    })
}

/// Validate each JSON line and report per-record issues and the final tally
pub async fn run_validate(args: &ValidateArgs, config: &MonitorConfig) -> Result<CommandOutput> {
    if config.quality.schema.is_empty() {
        return Err(anyhow!(
            "No schema configured; declare features under [quality.schema]"
        ));
    }

    let sink = Arc::new(PrometheusSink::new());
    let validator = config.build_quality_validator(sink.clone())?;
    let content = read_input(&args.records).await?;

    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(line)
            .with_context(|| format!("Line {} is not valid JSON", index + 1))?;
        let issues = validator.validate(&record);
        records.push(json!({ "line": index + 1, "issues": issues }));
    }

    Ok(CommandOutput {
        report: json!({ "records": records, "tally": validator.tally() }),
        metrics: metrics_text(&sink, args.prometheus)?,
    })
}

/// Feed observations through a confidence window and report its statistics
pub async fn run_confidence(
    args: &ConfidenceArgs,
    config: &MonitorConfig,
) -> Result<CommandOutput> {
    let observations: Vec<ConfidenceObservation> =
        serde_json::from_str(&read_input(&args.input).await?)
            .context("Input is not a list of confidence observations")?;

    let mut config = config.clone();
    if let Some(window_size) = args.window_size {
        config.confidence.window_size = window_size;
    }

    let sink = Arc::new(PrometheusSink::new());
    let analyzer = config.build_confidence_analyzer(sink.clone())?;
    for (index, obs) in observations.iter().enumerate() {
        analyzer
            .log_confidence(obs.confidence, obs.is_correct)
            .with_context(|| format!("Observation {} rejected", index))?;
    }

    Ok(CommandOutput {
        report: json!({ "statistics": analyzer.get_statistics() }),
        metrics: metrics_text(&sink, args.prometheus)?,
    })
}
