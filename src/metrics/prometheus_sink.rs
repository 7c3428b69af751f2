// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/metrics/prometheus_sink.rs - Sink backed by a prometheus registry

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::RwLock;

use super::names::help_for;
use super::sink::MetricsSink;
use crate::errors::SinkError;

/// Metrics sink that registers `GaugeVec`/`CounterVec` families on first use.
///
/// The label names of a family are fixed by the first call for that name;
/// later calls with a different label set are rejected by the registry.
pub struct PrometheusSink {
    registry: Registry,
    gauges: RwLock<HashMap<String, GaugeVec>>,
    counters: RwLock<HashMap<String, CounterVec>>,
}

impl PrometheusSink {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Register families into an existing registry (e.g. the serving layer's)
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            gauges: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode everything registered so far in text exposition format
    pub fn render(&self) -> Result<String, SinkError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| SinkError::Unavailable(e.to_string()))
    }

    fn gauge_family(&self, name: &str, label_names: &[&str]) -> Result<GaugeVec, SinkError> {
        if let Some(family) = self.gauges.read().ok().and_then(|g| g.get(name).cloned()) {
            return Ok(family);
        }

        let mut gauges = self
            .gauges
            .write()
            .map_err(|_| SinkError::Unavailable("gauge registry lock poisoned".to_string()))?;
        if let Some(family) = gauges.get(name) {
            return Ok(family.clone());
        }

        let family = GaugeVec::new(Opts::new(name, help_for(name)), label_names)
            .map_err(|e| registration_error(name, e))?;
        self.registry
            .register(Box::new(family.clone()))
            .map_err(|e| registration_error(name, e))?;
        gauges.insert(name.to_string(), family.clone());
        Ok(family)
    }

    fn counter_family(&self, name: &str, label_names: &[&str]) -> Result<CounterVec, SinkError> {
        if let Some(family) = self.counters.read().ok().and_then(|c| c.get(name).cloned()) {
            return Ok(family);
        }

        let mut counters = self
            .counters
            .write()
            .map_err(|_| SinkError::Unavailable("counter registry lock poisoned".to_string()))?;
        if let Some(family) = counters.get(name) {
            return Ok(family.clone());
        }

        let family = CounterVec::new(Opts::new(name, help_for(name)), label_names)
            .map_err(|e| registration_error(name, e))?;
        self.registry
            .register(Box::new(family.clone()))
            .map_err(|e| registration_error(name, e))?;
        counters.insert(name.to_string(), family.clone());
        Ok(family)
    }
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for PrometheusSink {
    fn set_gauge(
        &self,
        name: &str,
        labels: &[(&str, &str)],
        value: f64,
    ) -> Result<(), SinkError> {
        let label_names: Vec<&str> = labels.iter().map(|(k, _)| *k).collect();
        let family = self.gauge_family(name, &label_names)?;
        let values: HashMap<&str, &str> = labels.iter().copied().collect();
        family
            .get_metric_with(&values)
            .map_err(|e| SinkError::Labels {
                name: name.to_string(),
                reason: e.to_string(),
            })?
            .set(value);
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

        let label_names: Vec<&str> = labels.iter().map(|(k, _)| *k).collect();
        let family = self.counter_family(name, &label_names)?;
        let values: HashMap<&str, &str> = labels.iter().copied().collect();
        family
            .get_metric_with(&values)
            .map_err(|e| SinkError::Labels {
                name: name.to_string(),
                reason: e.to_string(),
            })?
            .inc_by(amount);
        Ok(())
    }
}

fn registration_error(name: &str, err: prometheus::Error) -> SinkError {
    SinkError::Registration {
        name: name.to_string(),
        reason: err.to_string(),
    }
}
