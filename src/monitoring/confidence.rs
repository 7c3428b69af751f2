// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/confidence.rs - Rolling prediction confidence and calibration analysis

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::stats;
use crate::errors::{MonitorError, MonitorResult};
use crate::metrics::names;
use crate::metrics::{MetricsReporter, MetricsSink};

pub const DEFAULT_WINDOW_SIZE: usize = 1000;
pub const DEFAULT_LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;
pub const CALIBRATION_BUCKETS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceObservation {
    pub confidence: f64,
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    /// Expected calibration error; `None` when no observation carries a correctness flag
    pub calibration_score: Option<f64>,
    pub low_confidence_count: usize,
    pub labeled_count: usize,
}

impl ConfidenceStatistics {
    /// Flat name -> value view, omitting the calibration score when absent
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("count".to_string(), self.count as f64);
        map.insert("mean".to_string(), self.mean);
        map.insert("median".to_string(), self.median);
        map.insert("std".to_string(), self.std);
        map.insert("min".to_string(), self.min);
        map.insert("max".to_string(), self.max);
        map.insert("p25".to_string(), self.p25);
        map.insert("p50".to_string(), self.p50);
        map.insert("p75".to_string(), self.p75);
        map.insert("p95".to_string(), self.p95);
        map.insert(
            "low_confidence_count".to_string(),
            self.low_confidence_count as f64,
        );
        map.insert("labeled_count".to_string(), self.labeled_count as f64);
        if let Some(score) = self.calibration_score {
            map.insert("calibration_score".to_string(), score);
        }
        map
    }
}

/// Expected calibration error over equal-width confidence buckets.
///
/// Only observations with a correctness flag take part; each bucket's gap
/// between mean confidence and accuracy is weighted by its share of them.
pub fn expected_calibration_error(observations: &[ConfidenceObservation]) -> Option<f64> {
    let mut buckets = [(0usize, 0.0f64, 0usize); CALIBRATION_BUCKETS];
    let mut labeled = 0usize;

    for obs in observations {
        let correct = match obs.is_correct {
            Some(flag) => flag,
            None => continue,
        };
        let bucket = ((obs.confidence * CALIBRATION_BUCKETS as f64).floor() as usize)
            .min(CALIBRATION_BUCKETS - 1);
        let (count, confidence_sum, correct_count) = &mut buckets[bucket];
        *count += 1;
        *confidence_sum += obs.confidence;
        if correct {
            *correct_count += 1;
        }
        labeled += 1;
    }

    if labeled == 0 {
        return None;
    }

    let ece = buckets
        .iter()
        .filter(|(count, _, _)| *count > 0)
        .map(|&(count, confidence_sum, correct_count)| {
            let n = count as f64;
            let gap = (correct_count as f64 / n - confidence_sum / n).abs();
            gap * n / labeled as f64
        })
        .sum();
    Some(ece)
}

/// Fixed-capacity window of confidence scores for one model
pub struct ConfidenceAnalyzer {
    model_name: String,
    window_size: usize,
    low_confidence_threshold: f64,
    window: Mutex<VecDeque<ConfidenceObservation>>,
    reporter: MetricsReporter,
}

impl ConfidenceAnalyzer {
    pub fn new(
        model_name: impl Into<String>,
        window_size: usize,
        sink: Arc<dyn MetricsSink>,
    ) -> MonitorResult<Self> {
        if window_size == 0 {
            return Err(MonitorError::Configuration(
                "confidence window size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            model_name: model_name.into(),
            window_size,
            low_confidence_threshold: DEFAULT_LOW_CONFIDENCE_THRESHOLD,
            window: Mutex::new(VecDeque::with_capacity(window_size)),
            reporter: MetricsReporter::new(sink),
        })
    }

    pub fn with_low_confidence_threshold(mut self, threshold: f64) -> MonitorResult<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(MonitorError::Configuration(format!(
                "low confidence threshold must be in [0, 1], got {}",
                threshold
            )));
        }
        self.low_confidence_threshold = threshold;
        Ok(self)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn low_confidence_threshold(&self) -> f64 {
        self.low_confidence_threshold
    }

    fn lock_window(&self) -> MutexGuard<'_, VecDeque<ConfidenceObservation>> {
        self.window.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one observation, evicting the oldest once the window is full
    pub fn log_confidence(&self, confidence: f64, is_correct: Option<bool>) -> MonitorResult<()> {
        // NaN fails the range check too
        if !(0.0..=1.0).contains(&confidence) {
            return Err(MonitorError::OutOfRange {
                field: "confidence",
                value: confidence,
                min: 0.0,
                max: 1.0,
            });
        }

        {
            let mut window = self.lock_window();
            if window.len() == self.window_size {
                window.pop_front();
            }
            window.push_back(ConfidenceObservation {
                confidence,
                is_correct,
            });
        }

        if confidence < self.low_confidence_threshold {
            debug!(model = %self.model_name, confidence, "Low confidence prediction");
            self.reporter.inc(
                names::LOW_CONFIDENCE_TOTAL,
                &[("model", self.model_name.as_str())],
            );
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock_window().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_window().is_empty()
    }

    /// Copy of the current window, oldest first
    pub fn observations(&self) -> Vec<ConfidenceObservation> {
        self.lock_window().iter().copied().collect()
    }

    /// Distribution and calibration statistics over the window, `None` when empty
    pub fn get_statistics(&self) -> Option<ConfidenceStatistics> {
        let observations = self.observations();
        if observations.is_empty() {
            warn!(model = %self.model_name, "Confidence window is empty");
            return None;
        }

        let confidences: Vec<f64> = observations.iter().map(|o| o.confidence).collect();
        let sorted = stats::sorted_finite(&confidences);
        let median = stats::percentile(&sorted, 50.0);

        let statistics = ConfidenceStatistics {
            count: sorted.len(),
            mean: stats::mean(&sorted),
            median,
            std: stats::std_dev(&sorted),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p25: stats::percentile(&sorted, 25.0),
            p50: median,
            p75: stats::percentile(&sorted, 75.0),
            p95: stats::percentile(&sorted, 95.0),
            calibration_score: expected_calibration_error(&observations),
            low_confidence_count: sorted
                .iter()
                .filter(|&&c| c < self.low_confidence_threshold)
                .count(),
            labeled_count: observations.iter().filter(|o| o.is_correct.is_some()).count(),
        };

        let labels = [("model", self.model_name.as_str())];
        self.reporter
            .gauge(names::CONFIDENCE_MEAN, &labels, statistics.mean);
        self.reporter
            .gauge(names::CONFIDENCE_P95, &labels, statistics.p95);
        if let Some(score) = statistics.calibration_score {
            self.reporter.gauge(names::CALIBRATION_ERROR, &labels, score);
        }

        info!(
            model = %self.model_name,
            count = statistics.count,
            mean = statistics.mean,
            p95 = statistics.p95,
            calibration = ?statistics.calibration_score,
            "Confidence statistics computed"
        );

        Some(statistics)
    }

    pub fn reset(&self) {
        self.lock_window().clear();
        info!(model = %self.model_name, "Confidence window reset");
    }
}

impl std::fmt::Debug for ConfidenceAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfidenceAnalyzer")
            .field("model_name", &self.model_name)
            .field("window_size", &self.window_size)
            .field("low_confidence_threshold", &self.low_confidence_threshold)
            .finish()
    }
}
