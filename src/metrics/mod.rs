// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/metrics/mod.rs - Metrics export boundary

pub mod memory;
pub mod names;
pub mod prometheus_sink;
pub mod sink;

pub use memory::{InMemorySink, MetricSample, MetricType};
pub use prometheus_sink::PrometheusSink;
pub use sink::{MetricsReporter, MetricsSink, NullSink};
