// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/metrics/memory.rs - In-process label-keyed metrics store

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use super::sink::MetricsSink;
use crate::errors::SinkError;

type LabelKey = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    Counter,
    Gauge,
}

/// One label-keyed series as stored in the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub metric_type: MetricType,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

#[derive(Default)]
struct SinkState {
    gauges: HashMap<String, HashMap<LabelKey, f64>>,
    counters: HashMap<String, HashMap<LabelKey, f64>>,
}

/// Metrics sink that keeps every series in memory.
///
/// Useful for tests and for embedding the monitor in a process that reads
/// values back itself. Use `PrometheusSink` for the text exposition format.
#[derive(Default)]
pub struct InMemorySink {
    state: RwLock<SinkState>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a gauge series, if it was ever set
    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let state = self.state.read().ok()?;
        state.gauges.get(name)?.get(&label_key(labels)).copied()
    }

    /// Current value of a counter series (0 if never incremented)
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        let state = match self.state.read() {
            Ok(s) => s,
            Err(_) => return 0.0,
        };
        state
            .counters
            .get(name)
            .and_then(|series| series.get(&label_key(labels)))
            .copied()
            .unwrap_or(0.0)
    }

    /// Sum of a counter across all label sets
    pub fn counter_total(&self, name: &str) -> f64 {
        let state = match self.state.read() {
            Ok(s) => s,
            Err(_) => return 0.0,
        };
        state
            .counters
            .get(name)
            .map(|series| series.values().sum())
            .unwrap_or(0.0)
    }

    /// All series, ordered by name then labels
    pub fn samples(&self) -> Vec<MetricSample> {
        let state = match self.state.read() {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };

        let mut samples = Vec::new();
        for (metric_type, family) in [
            (MetricType::Counter, &state.counters),
            (MetricType::Gauge, &state.gauges),
        ] {
            for (name, series) in family {
                for (labels, value) in series {
                    samples.push(MetricSample {
                        name: name.clone(),
                        metric_type,
                        labels: labels.clone(),
                        value: *value,
                    });
                }
            }
        }
        samples.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.labels.cmp(&b.labels)));
        samples
    }

    pub fn reset(&self) {
        if let Ok(mut state) = self.state.write() {
            state.gauges.clear();
            state.counters.clear();
        }
    }
}

impl MetricsSink for InMemorySink {
    fn set_gauge(
        &self,
        name: &str,
        labels: &[(&str, &str)],
        value: f64,
    ) -> Result<(), SinkError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| SinkError::Unavailable("metrics store lock poisoned".to_string()))?;
        state
            .gauges
            .entry(name.to_string())
            .or_default()
            .insert(label_key(labels), value);
        Ok(())
    }

    fn increment_counter(
        &self,
        name: &str,
        labels: &[(&str, &str)],
        amount: f64,
    ) -> Result<(), SinkError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(SinkError::InvalidValue {
                name: name.to_string(),
                value: amount,
            });
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| SinkError::Unavailable("metrics store lock poisoned".to_string()))?;
        let value = state
            .counters
            .entry(name.to_string())
            .or_default()
            .entry(label_key(labels))
            .or_insert(0.0);
        *value += amount;
        Ok(())
    }
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}
