// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/performance.rs - Prediction accuracy tracking against delayed ground truth

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::{MonitorError, MonitorResult};
use crate::metrics::names;
use crate::metrics::{MetricsReporter, MetricsSink};

pub const DEFAULT_MIN_SAMPLES: usize = 100;
pub const DEFAULT_DEGRADATION_THRESHOLD: f64 = 0.1;
pub const DEFAULT_CORRELATION_CAPACITY: usize = 10_000;

// Absorbs rounding in `baseline - accuracy` so a drop of exactly `threshold` counts
const DEGRADATION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub prediction: i64,
    pub ground_truth: Option<i64>,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn is_labeled(&self) -> bool {
        self.ground_truth.is_some()
    }
}

/// Support-weighted classification metrics over all labeled predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub sample_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of attaching a late label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelResolution {
    Attached,
    /// Id never logged, or already evicted from the bounded lookup table
    UnknownCorrelationId,
}

/// Confusion matrix over arbitrary integer class labels
///
/// `counts[t][p]` is the number of samples with true class `classes[t]`
/// predicted as `classes[p]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    classes: Vec<i64>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Build from `(prediction, ground_truth)` pairs; classes are the sorted
    /// union of every label seen on either side
    pub fn from_pairs(pairs: &[(i64, i64)]) -> Self {
        let mut index: BTreeMap<i64, usize> = BTreeMap::new();
        for &(predicted, actual) in pairs {
            index.insert(predicted, 0);
            index.insert(actual, 0);
        }
        for (position, slot) in index.values_mut().enumerate() {
            *slot = position;
        }

        let n = index.len();
        let mut counts = vec![vec![0usize; n]; n];
        for (predicted, actual) in pairs {
            counts[index[actual]][index[predicted]] += 1;
        }

        Self {
            classes: index.into_keys().collect(),
            counts,
        }
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Count of samples with true class `actual` predicted as `predicted`
    pub fn get(&self, actual: i64, predicted: i64) -> usize {
        match (self.position(actual), self.position(predicted)) {
            (Some(t), Some(p)) => self.counts[t][p],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.n_classes()).map(|i| self.counts[i][i]).sum()
    }

    fn position(&self, class: i64) -> Option<usize> {
        self.classes.binary_search(&class).ok()
    }

    fn true_positives(&self, i: usize) -> usize {
        self.counts[i][i]
    }

    fn false_positives(&self, i: usize) -> usize {
        (0..self.n_classes())
            .filter(|&t| t != i)
            .map(|t| self.counts[t][i])
            .sum()
    }

    fn false_negatives(&self, i: usize) -> usize {
        (0..self.n_classes())
            .filter(|&p| p != i)
            .map(|p| self.counts[i][p])
            .sum()
    }

    fn support(&self, i: usize) -> usize {
        self.counts[i].iter().sum()
    }
}

/// Per-class scores for one class label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub class: i64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 with zero-division mapped to 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub per_class: Vec<ClassScores>,
}

impl ClassificationMetrics {
    pub fn from_confusion_matrix(cm: &ConfusionMatrix) -> Self {
        let per_class = cm
            .classes()
            .iter()
            .enumerate()
            .map(|(i, &class)| {
                let tp = cm.true_positives(i) as f64;
                let fp = cm.false_positives(i) as f64;
                let fn_ = cm.false_negatives(i) as f64;

                let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
                let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassScores {
                    class,
                    precision,
                    recall,
                    f1,
                    support: cm.support(i),
                }
            })
            .collect();

        let total = cm.total();
        let accuracy = if total == 0 {
            0.0
        } else {
            cm.correct() as f64 / total as f64
        };

        Self {
            accuracy,
            per_class,
        }
    }

    pub fn weighted_precision(&self) -> f64 {
        self.weighted(|s| s.precision)
    }

    pub fn weighted_recall(&self) -> f64 {
        self.weighted(|s| s.recall)
    }

    pub fn weighted_f1(&self) -> f64 {
        self.weighted(|s| s.f1)
    }

    fn weighted(&self, metric: impl Fn(&ClassScores) -> f64) -> f64 {
        let total_support: usize = self.per_class.iter().map(|s| s.support).sum();
        if total_support == 0 {
            return 0.0;
        }
        self.per_class
            .iter()
            .map(|s| metric(s) * s.support as f64)
            .sum::<f64>()
            / total_support as f64
    }
}

#[derive(Default)]
struct PerformanceState {
    records: Vec<PredictionRecord>,
    /// correlation id -> position in `records`
    index: HashMap<String, usize>,
    /// Index insertion order, oldest first, for bounded eviction
    order: VecDeque<(String, usize)>,
    labeled: usize,
}

/// Tracks predictions and late-arriving labels for one model
pub struct PerformanceMonitor {
    model_name: String,
    min_samples: usize,
    correlation_capacity: usize,
    state: Mutex<PerformanceState>,
    reporter: MetricsReporter,
}

impl PerformanceMonitor {
    pub fn new(
        model_name: impl Into<String>,
        min_samples: usize,
        sink: Arc<dyn MetricsSink>,
    ) -> MonitorResult<Self> {
        if min_samples == 0 {
            return Err(MonitorError::Configuration(
                "min_samples must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            model_name: model_name.into(),
            min_samples,
            correlation_capacity: DEFAULT_CORRELATION_CAPACITY,
            state: Mutex::new(PerformanceState::default()),
            reporter: MetricsReporter::new(sink),
        })
    }

    /// Bound the number of correlation ids kept for late labels
    pub fn with_correlation_capacity(mut self, capacity: usize) -> MonitorResult<Self> {
        if capacity == 0 {
            return Err(MonitorError::Configuration(
                "correlation capacity must be at least 1".to_string(),
            ));
        }
        self.correlation_capacity = capacity;
        Ok(self)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    fn lock_state(&self) -> MutexGuard<'_, PerformanceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a prediction and return the correlation id to label it with later.
    ///
    /// A fresh UUID is generated when the caller does not supply an id.
    pub fn log_prediction(
        &self,
        prediction: i64,
        ground_truth: Option<i64>,
        correlation_id: Option<&str>,
    ) -> String {
        let id = correlation_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let record = PredictionRecord {
            prediction,
            ground_truth,
            correlation_id: id.clone(),
            timestamp: Utc::now(),
        };

        {
            let mut state = self.lock_state();
            let position = state.records.len();
            state.records.push(record);
            if ground_truth.is_some() {
                state.labeled += 1;
            }
            state.index.insert(id.clone(), position);
            state.order.push_back((id.clone(), position));

            while state.order.len() > self.correlation_capacity {
                if let Some((evicted, evicted_position)) = state.order.pop_front() {
                    // A reused id may point at a newer record; keep that mapping
                    if state.index.get(&evicted) == Some(&evicted_position) {
                        state.index.remove(&evicted);
                    }
                }
            }
        }

        debug!(
            model = %self.model_name,
            correlation_id = %id,
            prediction,
            labeled = ground_truth.is_some(),
            "Prediction logged"
        );
        id
    }

    /// Attach a ground-truth label to an earlier prediction
    pub fn add_ground_truth(&self, correlation_id: &str, label: i64) -> LabelResolution {
        let attached = {
            let mut state = self.lock_state();
            match state.index.get(correlation_id).copied() {
                Some(position) => {
                    let was_labeled = state.records[position].ground_truth.is_some();
                    state.records[position].ground_truth = Some(label);
                    if !was_labeled {
                        state.labeled += 1;
                    }
                    true
                }
                None => false,
            }
        };

        if attached {
            debug!(model = %self.model_name, correlation_id, label, "Ground truth attached");
            LabelResolution::Attached
        } else {
            warn!(
                model = %self.model_name,
                correlation_id,
                "Ground truth for unknown correlation id"
            );
            self.reporter.inc(
                names::UNKNOWN_CORRELATION_TOTAL,
                &[("model", self.model_name.as_str())],
            );
            LabelResolution::UnknownCorrelationId
        }
    }

    pub fn labeled_count(&self) -> usize {
        self.lock_state().labeled
    }

    /// Predictions still waiting for a label
    pub fn pending_count(&self) -> usize {
        let state = self.lock_state();
        state.records.len() - state.labeled
    }

    pub fn prediction_count(&self) -> usize {
        self.lock_state().records.len()
    }

    fn labeled_pairs(&self) -> Vec<(i64, i64)> {
        let state = self.lock_state();
        state
            .records
            .iter()
            .filter_map(|r| r.ground_truth.map(|truth| (r.prediction, truth)))
            .collect()
    }

    pub fn confusion_matrix(&self) -> ConfusionMatrix {
        ConfusionMatrix::from_pairs(&self.labeled_pairs())
    }

    /// Compute metrics over all labeled predictions, or `None` below `min_samples`
    pub fn calculate_metrics(&self) -> Option<PerformanceSnapshot> {
        let pairs = self.labeled_pairs();
        if pairs.len() < self.min_samples {
            warn!(
                model = %self.model_name,
                current = pairs.len(),
                required = self.min_samples,
                "Insufficient labeled samples for performance metrics"
            );
            return None;
        }

        let matrix = ConfusionMatrix::from_pairs(&pairs);
        let metrics = ClassificationMetrics::from_confusion_matrix(&matrix);
        let snapshot = PerformanceSnapshot {
            accuracy: metrics.accuracy,
            precision: metrics.weighted_precision(),
            recall: metrics.weighted_recall(),
            f1_score: metrics.weighted_f1(),
            sample_count: pairs.len(),
            timestamp: Utc::now(),
        };

        let labels = [("model", self.model_name.as_str())];
        self.reporter.gauge(names::ACCURACY, &labels, snapshot.accuracy);
        self.reporter.gauge(names::PRECISION, &labels, snapshot.precision);
        self.reporter.gauge(names::RECALL, &labels, snapshot.recall);
        self.reporter.gauge(names::F1_SCORE, &labels, snapshot.f1_score);
        self.reporter
            .gauge(names::LABELED_SAMPLES, &labels, snapshot.sample_count as f64);

        info!(
            model = %self.model_name,
            accuracy = snapshot.accuracy,
            precision = snapshot.precision,
            recall = snapshot.recall,
            f1 = snapshot.f1_score,
            samples = snapshot.sample_count,
            "Performance metrics computed"
        );

        Some(snapshot)
    }

    /// Whether accuracy dropped by at least `threshold` below `baseline_accuracy`.
    ///
    /// Always false while fewer than `min_samples` labels exist.
    pub fn check_degradation(&self, baseline_accuracy: f64, threshold: f64) -> bool {
        let snapshot = match self.calculate_metrics() {
            Some(s) => s,
            None => return false,
        };

        let degradation = baseline_accuracy - snapshot.accuracy;
        if degradation + DEGRADATION_TOLERANCE < threshold {
            return false;
        }

        error!(
            model = %self.model_name,
            baseline = baseline_accuracy,
            current = snapshot.accuracy,
            degradation,
            threshold,
            "Model performance degradation detected"
        );
        self.reporter.inc(
            names::DEGRADATION_DETECTED_TOTAL,
            &[("model", self.model_name.as_str())],
        );
        true
    }

    /// Drop all predictions, labels and correlation ids
    pub fn reset(&self) {
        let mut state = self.lock_state();
        *state = PerformanceState::default();
        info!(model = %self.model_name, "Performance history reset");
    }
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("model_name", &self.model_name)
            .field("min_samples", &self.min_samples)
            .field("correlation_capacity", &self.correlation_capacity)
            .finish()
    }
}
