// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/mod.rs - Drift, performance, confidence and data-quality analyzers

pub mod confidence;
pub mod drift;
pub mod performance;
pub mod quality;
pub mod stats;

// Re-export main types
pub use drift::{
    DriftConfig, DriftDetector, DriftMethod, DriftResult, DriftSeverity, DriftSummary,
    FeatureBatch, ReferenceDistribution,
};

pub use performance::{
    ClassScores, ClassificationMetrics, ConfusionMatrix, LabelResolution, PerformanceMonitor,
    PerformanceSnapshot, PredictionRecord,
};

pub use confidence::{
    expected_calibration_error, ConfidenceAnalyzer, ConfidenceObservation, ConfidenceStatistics,
};

pub use quality::{
    DataQualityValidator, FeatureType, NumericRange, QualityIssueTally, QualityIssues,
    RangePredicate, SchemaDefinition,
};
