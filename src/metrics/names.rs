// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/metrics/names.rs - Exported metric names and help strings

pub const DRIFT_SCORE: &str = "model_drift_score";
pub const DRIFT_P_VALUE: &str = "model_drift_p_value";
pub const DRIFT_DETECTED_TOTAL: &str = "model_drift_detected_total";
pub const DRIFT_INSUFFICIENT_DATA_TOTAL: &str = "model_drift_insufficient_data_total";

pub const ACCURACY: &str = "model_accuracy";
pub const PRECISION: &str = "model_precision";
pub const RECALL: &str = "model_recall";
pub const F1_SCORE: &str = "model_f1_score";
pub const LABELED_SAMPLES: &str = "model_labeled_samples";
pub const DEGRADATION_DETECTED_TOTAL: &str = "model_degradation_detected_total";
pub const UNKNOWN_CORRELATION_TOTAL: &str = "model_unknown_correlation_total";

pub const CONFIDENCE_MEAN: &str = "model_confidence_mean";
pub const CONFIDENCE_P95: &str = "model_confidence_p95";
pub const CALIBRATION_ERROR: &str = "model_calibration_error";
pub const LOW_CONFIDENCE_TOTAL: &str = "model_low_confidence_total";

pub const QUALITY_MISSING_TOTAL: &str = "data_quality_missing_total";
pub const QUALITY_TYPE_ERROR_TOTAL: &str = "data_quality_type_error_total";
pub const QUALITY_OUT_OF_RANGE_TOTAL: &str = "data_quality_out_of_range_total";
pub const QUALITY_SCHEMA_MISMATCH_TOTAL: &str = "data_quality_schema_mismatch_total";
pub const QUALITY_RECORDS_VALIDATED_TOTAL: &str = "data_quality_records_validated_total";

/// Help text for a metric name, falling back to the name itself
pub fn help_for(name: &str) -> &str {
    match name {
        DRIFT_SCORE => "Drift test statistic per feature",
        DRIFT_P_VALUE => "Drift test p-value per feature",
        DRIFT_DETECTED_TOTAL => "Drift detections per feature",
        DRIFT_INSUFFICIENT_DATA_TOTAL => "Drift evaluations skipped for lack of data",
        ACCURACY => "Model accuracy over labeled predictions",
        PRECISION => "Support-weighted model precision",
        RECALL => "Support-weighted model recall",
        F1_SCORE => "Support-weighted model F1 score",
        LABELED_SAMPLES => "Labeled predictions available for metrics",
        DEGRADATION_DETECTED_TOTAL => "Accuracy degradation detections",
        UNKNOWN_CORRELATION_TOTAL => "Ground truth labels with no matching prediction",
        CONFIDENCE_MEAN => "Mean prediction confidence over the window",
        CONFIDENCE_P95 => "95th percentile prediction confidence over the window",
        CALIBRATION_ERROR => "Expected calibration error over the window",
        LOW_CONFIDENCE_TOTAL => "Predictions below the low confidence threshold",
        QUALITY_MISSING_TOTAL => "Requests missing a declared feature",
        QUALITY_TYPE_ERROR_TOTAL => "Requests with a feature of the wrong type",
        QUALITY_OUT_OF_RANGE_TOTAL => "Requests with a feature outside its range",
        QUALITY_SCHEMA_MISMATCH_TOTAL => "Requests not matching the declared schema",
        QUALITY_RECORDS_VALIDATED_TOTAL => "Requests validated",
        other => other,
    }
}
