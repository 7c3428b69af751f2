// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/drift.rs - Feature drift detection against a reference distribution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::stats;
use crate::errors::{MonitorError, MonitorResult};
use crate::metrics::names;
use crate::metrics::{MetricsReporter, MetricsSink, NullSink};

/// Upper bound for `psi_bins` and `js_bins`
pub const MAX_HISTOGRAM_BINS: usize = 10_000;

/// Statistical test used to compare a production sample with its reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftMethod {
    /// Two-sample Kolmogorov-Smirnov (continuous features)
    #[default]
    Ks,
    /// Population Stability Index
    Psi,
    /// Jensen-Shannon divergence
    Js,
    /// Chi-square goodness of fit (categorical codes)
    #[serde(rename = "chi2", alias = "chi_square")]
    ChiSquare,
}

impl DriftMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftMethod::Ks => "ks",
            DriftMethod::Psi => "psi",
            DriftMethod::Js => "js",
            DriftMethod::ChiSquare => "chi2",
        }
    }

    /// Whether the method yields a p-value that is compared to the significance threshold
    pub fn is_hypothesis_test(&self) -> bool {
        matches!(self, DriftMethod::Ks | DriftMethod::ChiSquare)
    }
}

impl fmt::Display for DriftMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriftMethod {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ks" => Ok(DriftMethod::Ks),
            "psi" => Ok(DriftMethod::Psi),
            "js" => Ok(DriftMethod::Js),
            "chi2" | "chi_square" => Ok(DriftMethod::ChiSquare),
            other => Err(MonitorError::Configuration(format!(
                "unknown drift method '{}' (expected ks, psi, js or chi2)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    None,
    /// PSI between the moderate and drift thresholds
    Moderate,
    Significant,
}

/// Outcome of one drift test for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftResult {
    pub feature: String,
    /// Test statistic; `None` when the sample was too small to test
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub is_drift: bool,
    pub severity: DriftSeverity,
    pub method: DriftMethod,
    pub insufficient_data: bool,
    /// Finite production values the test used
    pub sample_size: usize,
    pub timestamp: DateTime<Utc>,
}

impl DriftResult {
    fn insufficient(feature: &str, method: DriftMethod, sample_size: usize) -> Self {
        Self {
            feature: feature.to_string(),
            statistic: None,
            p_value: None,
            is_drift: false,
            severity: DriftSeverity::None,
            method,
            insufficient_data: true,
            sample_size,
            timestamp: Utc::now(),
        }
    }
}

/// Counts over one round of drift results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftSummary {
    pub total_features: usize,
    pub drifted_features: usize,
    pub moderate_features: usize,
    pub insufficient_features: usize,
}

impl DriftSummary {
    pub fn has_drift(&self) -> bool {
        self.drifted_features > 0
    }

    /// Fraction of evaluated features that drifted
    pub fn drift_share(&self) -> f64 {
        let evaluated = self.total_features.saturating_sub(self.insufficient_features);
        if evaluated == 0 {
            0.0
        } else {
            self.drifted_features as f64 / evaluated as f64
        }
    }
}

/// Column-major reference sample, one column per feature
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDistribution {
    columns: Vec<Vec<f64>>,
}

impl ReferenceDistribution {
    /// Build from one value vector per feature
    pub fn from_columns(columns: Vec<Vec<f64>>) -> MonitorResult<Self> {
        if columns.is_empty() {
            return Err(MonitorError::Configuration(
                "reference distribution needs at least one feature".to_string(),
            ));
        }
        for (index, column) in columns.iter().enumerate() {
            if let Some(bad) = column.iter().find(|v| !v.is_finite()) {
                return Err(MonitorError::Configuration(format!(
                    "reference feature {} contains non-finite value {}",
                    index, bad
                )));
            }
            if column.len() < 2 {
                return Err(MonitorError::Configuration(format!(
                    "reference feature {} has {} values, at least 2 required",
                    index,
                    column.len()
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Build from row-major samples (each row holds one value per feature)
    pub fn from_rows(rows: &[Vec<f64>]) -> MonitorResult<Self> {
        let width = match rows.first() {
            Some(row) => row.len(),
            None => {
                return Err(MonitorError::Configuration(
                    "reference distribution has no rows".to_string(),
                ))
            }
        };

        let mut columns = vec![Vec::with_capacity(rows.len()); width];
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(MonitorError::RowWidthMismatch {
                    row: row_index,
                    expected: width,
                    actual: row.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(*value);
            }
        }
        Self::from_columns(columns)
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&[f64]> {
        self.columns.get(index).map(|c| c.as_slice())
    }
}

/// Row-major production batch with a feature-name header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBatch {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureBatch {
    pub fn new(feature_names: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self {
            feature_names,
            rows,
        }
    }

    /// Build from one value vector per feature; columns must be equally long
    pub fn from_columns(feature_names: Vec<String>, columns: Vec<Vec<f64>>) -> MonitorResult<Self> {
        if feature_names.len() != columns.len() {
            return Err(MonitorError::SchemaMismatch {
                expected: feature_names.len(),
                actual: columns.len(),
            });
        }
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        if let Some((index, column)) = columns.iter().enumerate().find(|(_, c)| c.len() != n_rows)
        {
            return Err(MonitorError::Configuration(format!(
                "column '{}' has {} values, expected {}",
                feature_names[index],
                column.len(),
                n_rows
            )));
        }

        let rows = (0..n_rows)
            .map(|r| columns.iter().map(|c| c[r]).collect())
            .collect();
        Ok(Self::new(feature_names, rows))
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Transpose into one column per feature, checking every row's width
    pub fn columns(&self) -> MonitorResult<Vec<Vec<f64>>> {
        let width = self.feature_names.len();
        let mut columns = vec![Vec::with_capacity(self.rows.len()); width];
        for (row_index, row) in self.rows.iter().enumerate() {
            if row.len() != width {
                return Err(MonitorError::RowWidthMismatch {
                    row: row_index,
                    expected: width,
                    actual: row.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(*value);
            }
        }
        Ok(columns)
    }
}

/// Drift detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Default method for features without an override
    pub method: DriftMethod,
    /// Significance level for KS and chi-square
    pub threshold: f64,
    pub psi_threshold: f64,
    pub psi_moderate_threshold: f64,
    pub js_threshold: f64,
    pub psi_bins: usize,
    pub js_bins: usize,
    /// Per-feature method overrides
    pub feature_methods: HashMap<String, DriftMethod>,
}

impl Default for DriftConfig {
    fn default() -> Self {
        DriftConfig {
            method: DriftMethod::Ks,
            threshold: 0.05,
            psi_threshold: 0.25,
            psi_moderate_threshold: 0.1,
            js_threshold: 0.5,
            psi_bins: 10,
            js_bins: 50,
            feature_methods: HashMap::new(),
        }
    }
}

impl DriftConfig {
    pub fn validate(&self) -> MonitorResult<()> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(MonitorError::Configuration(format!(
                "drift significance threshold must be in (0, 1), got {}",
                self.threshold
            )));
        }
        if !(self.psi_moderate_threshold >= 0.0
            && self.psi_moderate_threshold <= self.psi_threshold)
        {
            return Err(MonitorError::Configuration(format!(
                "PSI thresholds must satisfy 0 <= moderate ({}) <= drift ({})",
                self.psi_moderate_threshold, self.psi_threshold
            )));
        }
        if !(self.js_threshold > 0.0 && self.js_threshold <= 1.0) {
            return Err(MonitorError::Configuration(format!(
                "JS threshold must be in (0, 1], got {}",
                self.js_threshold
            )));
        }
        for (key, bins) in [("psi_bins", self.psi_bins), ("js_bins", self.js_bins)] {
            if bins == 0 || bins > MAX_HISTOGRAM_BINS {
                return Err(MonitorError::Configuration(format!(
                    "{} must be in [1, {}], got {}",
                    key, MAX_HISTOGRAM_BINS, bins
                )));
            }
        }
        Ok(())
    }
}

/// Reference-side state for one feature, derived once at construction
#[derive(Debug, Clone)]
struct FeatureBaseline {
    name: String,
    method: DriftMethod,
    sorted: Vec<f64>,
    psi_edges: Vec<f64>,
    psi_proportions: Vec<f64>,
    categories: BTreeMap<i64, usize>,
}

/// Compares production batches with a fixed reference distribution.
///
/// The detector holds no mutable state: `detect` can be called concurrently
/// from any number of threads.
pub struct DriftDetector {
    baselines: Vec<FeatureBaseline>,
    config: DriftConfig,
    reporter: MetricsReporter,
}

impl DriftDetector {
    /// Detector with default thresholds for every method and no metrics export
    pub fn new(
        reference: ReferenceDistribution,
        feature_names: Vec<String>,
        threshold: f64,
        method: DriftMethod,
    ) -> MonitorResult<Self> {
        let config = DriftConfig {
            threshold,
            method,
            ..DriftConfig::default()
        };
        Self::with_config(reference, feature_names, config, Arc::new(NullSink))
    }

    pub fn with_config(
        reference: ReferenceDistribution,
        feature_names: Vec<String>,
        config: DriftConfig,
        sink: Arc<dyn MetricsSink>,
    ) -> MonitorResult<Self> {
        config.validate()?;

        if feature_names.len() != reference.n_features() {
            return Err(MonitorError::Configuration(format!(
                "{} feature names for {} reference features",
                feature_names.len(),
                reference.n_features()
            )));
        }

        let mut seen = HashSet::new();
        for name in &feature_names {
            if name.is_empty() {
                return Err(MonitorError::Configuration(
                    "feature names must not be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(MonitorError::Configuration(format!(
                    "duplicate feature name '{}'",
                    name
                )));
            }
        }
        if let Some(unknown) = config
            .feature_methods
            .keys()
            .find(|k| !seen.contains(k.as_str()))
        {
            return Err(MonitorError::Configuration(format!(
                "method override for unknown feature '{}'",
                unknown
            )));
        }

        let baselines = feature_names
            .into_iter()
            .zip(reference.columns)
            .map(|(name, column)| {
                let method = config
                    .feature_methods
                    .get(&name)
                    .copied()
                    .unwrap_or(config.method);
                let sorted = stats::sorted_finite(&column);
                let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
                let psi_edges = stats::histogram_edges(min, max, config.psi_bins);
                let psi_proportions = stats::proportions(&stats::bin_counts(&sorted, &psi_edges));
                let categories = stats::category_counts(&sorted);
                FeatureBaseline {
                    name,
                    method,
                    sorted,
                    psi_edges,
                    psi_proportions,
                    categories,
                }
            })
            .collect();

        Ok(Self {
            baselines,
            config,
            reporter: MetricsReporter::new(sink),
        })
    }

    /// Switch one feature to a different method
    pub fn with_feature_method(
        mut self,
        feature: &str,
        method: DriftMethod,
    ) -> MonitorResult<Self> {
        let baseline = self
            .baselines
            .iter_mut()
            .find(|b| b.name == feature)
            .ok_or_else(|| {
                MonitorError::Configuration(format!(
                    "method override for unknown feature '{}'",
                    feature
                ))
            })?;
        baseline.method = method;
        self.config
            .feature_methods
            .insert(feature.to_string(), method);
        Ok(self)
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.baselines.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn method_for(&self, feature: &str) -> Option<DriftMethod> {
        self.baselines
            .iter()
            .find(|b| b.name == feature)
            .map(|b| b.method)
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Batch header check: same count, same names, same order
    fn check_schema(&self, batch: &FeatureBatch) -> MonitorResult<()> {
        if batch.feature_names.len() != self.baselines.len() {
            return Err(MonitorError::SchemaMismatch {
                expected: self.baselines.len(),
                actual: batch.feature_names.len(),
            });
        }
        for (position, (baseline, actual)) in
            self.baselines.iter().zip(&batch.feature_names).enumerate()
        {
            if &baseline.name != actual {
                return Err(MonitorError::FeatureNameMismatch {
                    position,
                    expected: baseline.name.clone(),
                    actual: actual.clone(),
                });
            }
        }
        Ok(())
    }

    /// Run each feature's test on the batch; one result per feature, in declaration order
    pub fn detect(&self, batch: &FeatureBatch) -> MonitorResult<Vec<DriftResult>> {
        self.check_schema(batch)?;
        let columns = batch.columns()?;

        let results: Vec<DriftResult> = self
            .baselines
            .iter()
            .zip(columns.iter())
            .map(|(baseline, column)| self.evaluate(baseline, column))
            .collect();

        for result in &results {
            self.report(result);
        }

        Ok(results)
    }

    fn evaluate(&self, baseline: &FeatureBaseline, column: &[f64]) -> DriftResult {
        let current = stats::sorted_finite(column);
        let n = current.len();

        match baseline.method {
            DriftMethod::Ks => {
                if n < 2 {
                    return DriftResult::insufficient(&baseline.name, baseline.method, n);
                }
                let statistic = stats::ks_statistic(&baseline.sorted, &current);
                let p_value = stats::ks_p_value(statistic, baseline.sorted.len(), n);
                self.hypothesis_result(baseline, statistic, p_value, n)
            }
            DriftMethod::ChiSquare => {
                if n == 0 {
                    return DriftResult::insufficient(&baseline.name, baseline.method, n);
                }
                let current_categories = stats::category_counts(&current);
                let (statistic, df) = stats::chi_square(&baseline.categories, &current_categories);
                let p_value = stats::chi_square_p_value(statistic, df);
                self.hypothesis_result(baseline, statistic, p_value, n)
            }
            DriftMethod::Psi => {
                if n == 0 {
                    return DriftResult::insufficient(&baseline.name, baseline.method, n);
                }
                let current_proportions =
                    stats::proportions(&stats::bin_counts(&current, &baseline.psi_edges));
                let statistic = stats::population_stability_index(
                    &baseline.psi_proportions,
                    &current_proportions,
                );
                let severity = if statistic > self.config.psi_threshold {
                    DriftSeverity::Significant
                } else if statistic >= self.config.psi_moderate_threshold {
                    DriftSeverity::Moderate
                } else {
                    DriftSeverity::None
                };
                self.score_result(baseline, statistic, severity, n)
            }
            DriftMethod::Js => {
                let js = stats::jensen_shannon(&baseline.sorted, &current, self.config.js_bins);
                let statistic = match js {
                    Some(value) => value,
                    None => return DriftResult::insufficient(&baseline.name, baseline.method, n),
                };
                let severity = if statistic > self.config.js_threshold {
                    DriftSeverity::Significant
                } else {
                    DriftSeverity::None
                };
                self.score_result(baseline, statistic, severity, n)
            }
        }
    }

    fn hypothesis_result(
        &self,
        baseline: &FeatureBaseline,
        statistic: f64,
        p_value: f64,
        sample_size: usize,
    ) -> DriftResult {
        let is_drift = p_value < self.config.threshold;
        DriftResult {
            feature: baseline.name.clone(),
            statistic: Some(statistic),
            p_value: Some(p_value),
            is_drift,
            severity: if is_drift {
                DriftSeverity::Significant
            } else {
                DriftSeverity::None
            },
            method: baseline.method,
            insufficient_data: false,
            sample_size,
            timestamp: Utc::now(),
        }
    }

    fn score_result(
        &self,
        baseline: &FeatureBaseline,
        statistic: f64,
        severity: DriftSeverity,
        sample_size: usize,
    ) -> DriftResult {
        DriftResult {
            feature: baseline.name.clone(),
            statistic: Some(statistic),
            p_value: None,
            is_drift: severity == DriftSeverity::Significant,
            severity,
            method: baseline.method,
            insufficient_data: false,
            sample_size,
            timestamp: Utc::now(),
        }
    }

    fn report(&self, result: &DriftResult) {
        let labels = [
            ("feature", result.feature.as_str()),
            ("method", result.method.as_str()),
        ];

        if result.insufficient_data {
            warn!(
                feature = %result.feature,
                method = %result.method,
                sample_size = result.sample_size,
                "Insufficient production data for drift test"
            );
            self.reporter
                .inc(names::DRIFT_INSUFFICIENT_DATA_TOTAL, &labels);
            return;
        }

        if let Some(statistic) = result.statistic {
            self.reporter.gauge(names::DRIFT_SCORE, &labels, statistic);
        }
        if let Some(p_value) = result.p_value {
            self.reporter.gauge(names::DRIFT_P_VALUE, &labels, p_value);
        }

        if result.is_drift {
            warn!(
                feature = %result.feature,
                statistic = result.statistic.unwrap_or_default(),
                p_value = ?result.p_value,
                method = %result.method,
                "Drift detected"
            );
            self.reporter.inc(names::DRIFT_DETECTED_TOTAL, &labels);
        } else {
            debug!(
                feature = %result.feature,
                statistic = result.statistic.unwrap_or_default(),
                method = %result.method,
                severity = ?result.severity,
                "No drift"
            );
        }
    }

    /// Count drifted, moderate and untestable features in one round of results
    pub fn summarize(results: &[DriftResult]) -> DriftSummary {
        let mut summary = DriftSummary {
            total_features: results.len(),
            ..DriftSummary::default()
        };
        for result in results {
            if result.insufficient_data {
                summary.insufficient_features += 1;
            } else if result.is_drift {
                summary.drifted_features += 1;
            } else if result.severity == DriftSeverity::Moderate {
                summary.moderate_features += 1;
            }
        }
        summary
    }
}

impl fmt::Debug for DriftDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriftDetector")
            .field("features", &self.feature_names())
            .field("config", &self.config)
            .finish()
    }
}
