// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/monitoring/test_quality.rs

use fabstir_model_monitor::metrics::names::{
    QUALITY_MISSING_TOTAL, QUALITY_RECORDS_VALIDATED_TOTAL, QUALITY_SCHEMA_MISMATCH_TOTAL,
    QUALITY_TYPE_ERROR_TOTAL,
};
use fabstir_model_monitor::metrics::{InMemorySink, NullSink};
use fabstir_model_monitor::monitoring::{
    DataQualityValidator, FeatureType, NumericRange, SchemaDefinition,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread;

fn loan_schema() -> SchemaDefinition {
    SchemaDefinition::from_fields([
        ("age", FeatureType::Integer),
        ("income", FeatureType::Float),
        ("employment", FeatureType::String),
        ("has_default", FeatureType::Boolean),
    ])
    .unwrap()
}

fn clean_record() -> Value {
    json!({
        "age": 41,
        "income": 61250.0,
        "employment": "salaried",
        "has_default": false
    })
}

#[test]
fn test_missing_age_counted_once_per_call() {
    let validator = DataQualityValidator::new(loan_schema(), Arc::new(NullSink));
    let record = json!({ "income": 1.0, "employment": "x", "has_default": true });

    for expected in 1..=3u64 {
        let issues = validator.validate(&record);
        assert_eq!(issues.missing, vec!["age"]);
        assert!(issues.type_error.is_empty());
        assert!(issues.out_of_range.is_empty());
        assert_eq!(validator.tally().missing_count("age"), expected);
    }
    assert_eq!(validator.tally().missing_count("income"), 0);
}

#[test]
fn test_clean_record_has_empty_categories() {
    let validator = DataQualityValidator::new(loan_schema(), Arc::new(NullSink));
    let map = validator.validate(&clean_record()).to_map();

    for category in ["missing", "type_error", "out_of_range", "unexpected"] {
        assert!(map[category].is_empty(), "{} should be empty", category);
    }
    assert_eq!(validator.tally().records_validated, 1);
    assert_eq!(validator.tally().schema_mismatch, 0);
}

#[test]
fn test_type_errors_per_tag() {
    let validator = DataQualityValidator::new(loan_schema(), Arc::new(NullSink));
    let issues = validator.validate(&json!({
        "age": 41.5,
        "income": "lots",
        "employment": 3,
        "has_default": "no"
    }));
    assert_eq!(
        issues.type_error,
        vec!["age", "income", "employment", "has_default"]
    );
}

#[test]
fn test_integer_accepted_as_float() {
    let validator = DataQualityValidator::new(loan_schema(), Arc::new(NullSink));
    let mut record = clean_record();
    record["income"] = json!(60000);
    assert!(validator.validate(&record).is_clean());
}

#[test]
fn test_numeric_ranges() {
    let validator = DataQualityValidator::new(loan_schema(), Arc::new(NullSink))
        .with_numeric_range("age", NumericRange::new(18.0, 100.0))
        .unwrap()
        .with_numeric_range(
            "income",
            NumericRange {
                min: Some(0.0),
                max: None,
            },
        )
        .unwrap();

    let mut record = clean_record();
    record["age"] = json!(12);
    record["income"] = json!(-5.0);
    let issues = validator.validate(&record);
    assert_eq!(issues.out_of_range, vec!["age", "income"]);

    let tally = validator.tally();
    assert_eq!(tally.out_of_range_count("age"), 1);
    assert_eq!(tally.out_of_range_count("income"), 1);

    record["age"] = json!(100);
    record["income"] = json!(1e9);
    assert!(validator.validate(&record).is_clean());
}

#[test]
fn test_counters_exported_per_feature() {
    let sink = Arc::new(InMemorySink::new());
    let validator = DataQualityValidator::new(loan_schema(), sink.clone());

    validator.validate(&json!({ "age": "forty", "income": 1.0, "employment": "x" }));
    validator.validate(&json!("not an object"));

    assert_eq!(sink.counter(QUALITY_TYPE_ERROR_TOTAL, &[("feature", "age")]), 1.0);
    assert_eq!(
        sink.counter(QUALITY_MISSING_TOTAL, &[("feature", "has_default")]),
        2.0
    );
    assert_eq!(sink.counter(QUALITY_MISSING_TOTAL, &[("feature", "age")]), 1.0);
    assert_eq!(sink.counter(QUALITY_SCHEMA_MISMATCH_TOTAL, &[]), 1.0);
    assert_eq!(sink.counter(QUALITY_RECORDS_VALIDATED_TOTAL, &[]), 2.0);
}

#[test]
fn test_reset_tally() {
    let validator = DataQualityValidator::new(loan_schema(), Arc::new(NullSink));
    validator.validate(&json!({}));
    assert_eq!(validator.tally().missing_count("age"), 1);

    validator.reset_tally();
    let tally = validator.tally();
    assert_eq!(tally.missing_count("age"), 0);
    assert_eq!(tally.records_validated, 0);
}

#[test]
fn test_concurrent_validation_counts_exactly() {
    let validator = Arc::new(DataQualityValidator::new(loan_schema(), Arc::new(NullSink)));
    let record = Arc::new(json!({ "income": 1.0, "employment": "x", "has_default": true }));

    thread::scope(|scope| {
        for _ in 0..8 {
            let validator = validator.clone();
            let record = record.clone();
            scope.spawn(move || {
                for _ in 0..250 {
                    validator.validate(&record);
                }
            });
        }
    });

    let tally = validator.tally();
    assert_eq!(tally.missing_count("age"), 2000);
    assert_eq!(tally.records_validated, 2000);
}
