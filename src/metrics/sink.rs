// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/metrics/sink.rs - Metrics sink boundary and best-effort reporting

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use crate::errors::SinkError;

/// Label-keyed gauge/counter backend the analyzers export into.
///
/// Implementations must be cheap and non-blocking; the analyzers call them
/// from the request path. Errors are reported back but never propagate past
/// [`MetricsReporter`].
pub trait MetricsSink: Send + Sync {
    fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: f64)
        -> Result<(), SinkError>;

    fn increment_counter(
        &self,
        name: &str,
        labels: &[(&str, &str)],
        amount: f64,
    ) -> Result<(), SinkError>;
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn set_gauge(&self, _: &str, _: &[(&str, &str)], _: f64) -> Result<(), SinkError> {
        Ok(())
    }

    fn increment_counter(&self, _: &str, _: &[(&str, &str)], _: f64) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Fire-and-forget wrapper around a shared sink.
///
/// Failures are logged and counted, never returned.
#[derive(Clone)]
pub struct MetricsReporter {
    sink: Arc<dyn MetricsSink>,
    failures: Arc<AtomicU64>,
}

impl MetricsReporter {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn gauge(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        if let Err(e) = self.sink.set_gauge(name, labels, value) {
            self.record_failure(name, &e);
        }
    }

    pub fn counter(&self, name: &str, labels: &[(&str, &str)], amount: f64) {
        if let Err(e) = self.sink.increment_counter(name, labels, amount) {
            self.record_failure(name, &e);
        }
    }

    pub fn inc(&self, name: &str, labels: &[(&str, &str)]) {
        self.counter(name, labels, 1.0);
    }

    /// Number of exports the sink rejected since construction
    pub fn export_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn record_failure(&self, name: &str, err: &SinkError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        warn!(metric = %name, error = %err, "Metrics export failed");
    }
}

impl std::fmt::Debug for MetricsReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsReporter")
            .field("failures", &self.export_failures())
            .finish()
    }
}

impl Default for MetricsReporter {
    fn default() -> Self {
        Self::new(Arc::new(NullSink))
    }
}
