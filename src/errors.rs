// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the model monitor
//!
//! Only caller bugs are errors here:
//! - Configuration errors (feature count mismatch, bad thresholds, bad config files)
//! - Schema errors at detect time (feature count or feature name mismatch)
//! - Out-of-range inputs (confidence outside [0, 1])
//!
//! Data-sufficiency conditions (too few labels, empty windows, unknown
//! correlation ids) are reported as explicit "not available" values instead.

use thiserror::Error;

/// Errors returned synchronously by the monitoring components
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// Component constructed with inconsistent or impossible parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Production batch does not carry the reference feature set
    #[error("Schema mismatch: expected {expected} features, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    /// Production batch names a feature differently from the reference
    #[error("Feature name mismatch at position {position}: expected '{expected}', got '{actual}'")]
    FeatureNameMismatch {
        position: usize,
        expected: String,
        actual: String,
    },

    /// A batch row has a different width than the header
    #[error("Row {row} has {actual} values, header declares {expected} features")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Value outside its permitted domain
    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Configuration file or environment override could not be used
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MonitorError {
    /// Get error code for logging and metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            MonitorError::Configuration(_) => "CONFIGURATION_ERROR",
            MonitorError::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            MonitorError::FeatureNameMismatch { .. } => "FEATURE_NAME_MISMATCH",
            MonitorError::RowWidthMismatch { .. } => "ROW_WIDTH_MISMATCH",
            MonitorError::OutOfRange { .. } => "OUT_OF_RANGE",
            MonitorError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Check if this error was raised while building a component
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            MonitorError::Configuration(_) | MonitorError::InvalidConfig(_)
        )
    }

    /// Check if this error means a batch or record did not match the declared schema
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            MonitorError::SchemaMismatch { .. }
                | MonitorError::FeatureNameMismatch { .. }
                | MonitorError::RowWidthMismatch { .. }
        )
    }
}

pub type MonitorResult<T> = std::result::Result<T, MonitorError>;

/// Failure to hand a value to the metrics backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Metric registration failed for {name}: {reason}")]
    Registration { name: String, reason: String },

    #[error("Label set rejected for {name}: {reason}")]
    Labels { name: String, reason: String },

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: f64 },

    #[error("Metrics backend unavailable: {0}")]
    Unavailable(String),
}
