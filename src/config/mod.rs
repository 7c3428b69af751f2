// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/config/mod.rs - Monitor configuration from TOML files and environment

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::errors::{MonitorError, MonitorResult};
use crate::metrics::MetricsSink;
use crate::monitoring::confidence::{DEFAULT_LOW_CONFIDENCE_THRESHOLD, DEFAULT_WINDOW_SIZE};
use crate::monitoring::performance::{
    DEFAULT_CORRELATION_CAPACITY, DEFAULT_DEGRADATION_THRESHOLD, DEFAULT_MIN_SAMPLES,
};
use crate::monitoring::{
    ConfidenceAnalyzer, DataQualityValidator, DriftConfig, DriftDetector, FeatureType,
    NumericRange, PerformanceMonitor, ReferenceDistribution, SchemaDefinition,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub min_samples: usize,
    pub correlation_capacity: usize,
    /// Accuracy to compare against in degradation checks
    pub baseline_accuracy: Option<f64>,
    pub degradation_threshold: f64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_MIN_SAMPLES,
            correlation_capacity: DEFAULT_CORRELATION_CAPACITY,
            baseline_accuracy: None,
            degradation_threshold: DEFAULT_DEGRADATION_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub window_size: usize,
    pub low_confidence_threshold: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            low_confidence_threshold: DEFAULT_LOW_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Request schema and optional numeric bounds.
///
/// ```toml
/// [quality.schema]
/// age = "integer"
///
/// [quality.ranges.age]
/// min = 0
/// max = 120
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub schema: BTreeMap<String, FeatureType>,
    pub ranges: BTreeMap<String, NumericRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub model_name: String,
    pub drift: DriftConfig,
    pub performance: PerformanceConfig,
    pub confidence: ConfidenceConfig,
    pub quality: QualityConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            model_name: "default".to_string(),
            drift: DriftConfig::default(),
            performance: PerformanceConfig::default(),
            confidence: ConfidenceConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `MONITOR_*` environment overrides applied
    pub fn from_env() -> MonitorResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> MonitorResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; unparsable values are rejected
    pub fn apply_overrides<F>(&mut self, lookup: F) -> MonitorResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("MONITOR_MODEL_NAME") {
            self.model_name = val;
        }
        if let Some(val) = lookup("MONITOR_DRIFT_METHOD") {
            self.drift.method = val
                .parse()
                .map_err(|_| invalid_override("MONITOR_DRIFT_METHOD", &val))?;
        }
        if let Some(val) = lookup("MONITOR_DRIFT_THRESHOLD") {
            self.drift.threshold = parse_override("MONITOR_DRIFT_THRESHOLD", &val)?;
        }
        if let Some(val) = lookup("MONITOR_MIN_SAMPLES") {
            self.performance.min_samples = parse_override("MONITOR_MIN_SAMPLES", &val)?;
        }
        if let Some(val) = lookup("MONITOR_BASELINE_ACCURACY") {
            self.performance.baseline_accuracy =
                Some(parse_override("MONITOR_BASELINE_ACCURACY", &val)?);
        }
        if let Some(val) = lookup("MONITOR_WINDOW_SIZE") {
            self.confidence.window_size = parse_override("MONITOR_WINDOW_SIZE", &val)?;
        }
        if let Some(val) = lookup("MONITOR_LOW_CONFIDENCE_THRESHOLD") {
            self.confidence.low_confidence_threshold =
                parse_override("MONITOR_LOW_CONFIDENCE_THRESHOLD", &val)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if self.model_name.trim().is_empty() {
            return Err(MonitorError::InvalidConfig(
                "model_name must not be empty".to_string(),
            ));
        }

        self.drift.validate().map_err(|e| match e {
            MonitorError::Configuration(msg) => {
                MonitorError::InvalidConfig(format!("[drift] {}", msg))
            }
            other => other,
        })?;

        let perf = &self.performance;
        if perf.min_samples == 0 {
            return Err(MonitorError::InvalidConfig(
                "[performance] min_samples must be at least 1".to_string(),
            ));
        }
        if perf.correlation_capacity == 0 {
            return Err(MonitorError::InvalidConfig(
                "[performance] correlation_capacity must be at least 1".to_string(),
            ));
        }
        if let Some(baseline) = perf.baseline_accuracy {
            if !(0.0..=1.0).contains(&baseline) {
                return Err(MonitorError::InvalidConfig(format!(
                    "[performance] baseline_accuracy must be in [0, 1], got {}",
                    baseline
                )));
            }
        }
        if !(perf.degradation_threshold > 0.0 && perf.degradation_threshold <= 1.0) {
            return Err(MonitorError::InvalidConfig(format!(
                "[performance] degradation_threshold must be in (0, 1], got {}",
                perf.degradation_threshold
            )));
        }

        if self.confidence.window_size == 0 {
            return Err(MonitorError::InvalidConfig(
                "[confidence] window_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence.low_confidence_threshold) {
            return Err(MonitorError::InvalidConfig(format!(
                "[confidence] low_confidence_threshold must be in [0, 1], got {}",
                self.confidence.low_confidence_threshold
            )));
        }

        for (feature, range) in &self.quality.ranges {
            if !self.quality.schema.contains_key(feature) {
                return Err(MonitorError::InvalidConfig(format!(
                    "[quality] range for undeclared feature '{}'",
                    feature
                )));
            }
            if let (Some(min), Some(max)) = (range.min, range.max) {
                if min > max {
                    return Err(MonitorError::InvalidConfig(format!(
                        "[quality] range for '{}' has min {} above max {}",
                        feature, min, max
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn build_drift_detector(
        &self,
        reference: ReferenceDistribution,
        feature_names: Vec<String>,
        sink: Arc<dyn MetricsSink>,
    ) -> MonitorResult<DriftDetector> {
        DriftDetector::with_config(reference, feature_names, self.drift.clone(), sink)
    }

    pub fn build_performance_monitor(
        &self,
        sink: Arc<dyn MetricsSink>,
    ) -> MonitorResult<PerformanceMonitor> {
        PerformanceMonitor::new(self.model_name.clone(), self.performance.min_samples, sink)?
            .with_correlation_capacity(self.performance.correlation_capacity)
    }

    pub fn build_confidence_analyzer(
        &self,
        sink: Arc<dyn MetricsSink>,
    ) -> MonitorResult<ConfidenceAnalyzer> {
        ConfidenceAnalyzer::new(self.model_name.clone(), self.confidence.window_size, sink)?
            .with_low_confidence_threshold(self.confidence.low_confidence_threshold)
    }

    /// Validator over the configured schema; fields are declared in name order
    pub fn build_quality_validator(
        &self,
        sink: Arc<dyn MetricsSink>,
    ) -> MonitorResult<DataQualityValidator> {
        let schema = SchemaDefinition::from_fields(
            self.quality
                .schema
                .iter()
                .map(|(name, ty)| (name.clone(), *ty)),
        )?;
        self.quality
            .ranges
            .iter()
            .try_fold(DataQualityValidator::new(schema, sink), |validator, (feature, range)| {
                validator.with_numeric_range(feature, *range)
            })
    }
    /// Degradation check against the configured baseline. Always false without one.
    pub fn check_degradation(&self, monitor: &PerformanceMonitor) -> bool {
        self.performance.baseline_accuracy.map_or(false, |baseline| {
            monitor.check_degradation(baseline, self.performance.degradation_threshold)
        })
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> MonitorResult<T> {
    value.trim().parse().map_err(|_| invalid_override(key, value))
}

fn invalid_override(key: &str, value: &str) -> MonitorError {
    MonitorError::InvalidConfig(format!("{} has invalid value '{}'", key, value))
}
