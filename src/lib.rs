// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod monitoring;

// Re-export main types
pub use config::{ConfidenceConfig, MonitorConfig, PerformanceConfig, QualityConfig};
pub use errors::{MonitorError, MonitorResult, SinkError};
pub use metrics::{InMemorySink, MetricsReporter, MetricsSink, NullSink, PrometheusSink};
pub use monitoring::{
    ConfidenceAnalyzer, ConfidenceObservation, ConfidenceStatistics, ConfusionMatrix,
    DataQualityValidator, DriftConfig, DriftDetector, DriftMethod, DriftResult, DriftSeverity,
    DriftSummary, FeatureBatch, FeatureType, LabelResolution, NumericRange, PerformanceMonitor,
    PerformanceSnapshot, QualityIssueTally, QualityIssues, ReferenceDistribution,
    SchemaDefinition,
};
