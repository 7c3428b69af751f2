// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/monitoring/test_drift.rs

use fabstir_model_monitor::metrics::names::{DRIFT_DETECTED_TOTAL, DRIFT_SCORE};
use fabstir_model_monitor::metrics::InMemorySink;
use fabstir_model_monitor::monitoring::drift::MAX_HISTOGRAM_BINS;
use fabstir_model_monitor::monitoring::stats;
use fabstir_model_monitor::monitoring::{
    DriftConfig, DriftDetector, DriftMethod, DriftSeverity, FeatureBatch, ReferenceDistribution,
};
use fabstir_model_monitor::MonitorError;
use std::sync::Arc;
use std::thread;

use super::fixtures::{names, normal_grid, random_normals, single_feature_batch};

fn single_feature_detector(reference: Vec<f64>, method: DriftMethod) -> DriftDetector {
    let reference = ReferenceDistribution::from_columns(vec![reference]).unwrap();
    DriftDetector::new(reference, names(&["x"]), 0.05, method).unwrap()
}

#[test]
fn test_ks_same_distribution_no_drift() {
    let detector = single_feature_detector(normal_grid(1000, 0.0, 1.0), DriftMethod::Ks);
    let results = detector
        .detect(&single_feature_batch("x", normal_grid(800, 0.0, 1.0)))
        .unwrap();

    let result = &results[0];
    assert!(result.statistic.unwrap() < 0.1);
    assert!(!result.is_drift);
    assert!(result.p_value.unwrap() > 0.05);
    assert_eq!(result.severity, DriftSeverity::None);
}

#[test]
fn test_ks_same_distribution_random_samples() {
    let detector = single_feature_detector(random_normals(7, 2000, 0.0, 1.0), DriftMethod::Ks);
    let results = detector
        .detect(&single_feature_batch("x", random_normals(11, 2000, 0.0, 1.0)))
        .unwrap();
    assert!(results[0].statistic.unwrap() < 0.1);
}

#[test]
fn test_ks_detects_two_sigma_shift() {
    let detector = single_feature_detector(random_normals(1, 500, 0.0, 1.0), DriftMethod::Ks);
    let results = detector
        .detect(&single_feature_batch("x", random_normals(2, 500, 2.0, 1.0)))
        .unwrap();

    let result = &results[0];
    assert!(result.is_drift);
    assert!(result.p_value.unwrap() < 0.05);
    assert_eq!(result.method, DriftMethod::Ks);
    assert_eq!(result.severity, DriftSeverity::Significant);
}

#[test]
fn test_end_to_end_half_sigma_shift() {
    let sink = Arc::new(InMemorySink::new());
    let reference = ReferenceDistribution::from_columns(vec![normal_grid(1000, 0.0, 1.0)]).unwrap();
    let detector =
        DriftDetector::with_config(reference, names(&["age"]), DriftConfig::default(), sink.clone())
            .unwrap();

    let results = detector
        .detect(&single_feature_batch("age", normal_grid(1000, 0.5, 1.0)))
        .unwrap();

    let result = &results[0];
    let statistic = result.statistic.unwrap();
    assert!(result.is_drift);
    assert!((0.15..=0.35).contains(&statistic), "statistic was {}", statistic);
    assert_eq!(result.feature, "age");
    assert!(!result.insufficient_data);
    assert_eq!(result.sample_size, 1000);

    let labels = [("feature", "age"), ("method", "ks")];
    assert_eq!(sink.gauge(DRIFT_SCORE, &labels), Some(statistic));
    assert_eq!(sink.counter(DRIFT_DETECTED_TOTAL, &labels), 1.0);
}

#[test]
fn test_psi_identical_is_zero() {
    let values = normal_grid(1000, 0.0, 1.0);
    let detector = single_feature_detector(values.clone(), DriftMethod::Psi);
    let results = detector.detect(&single_feature_batch("x", values)).unwrap();

    assert_eq!(results[0].statistic, Some(0.0));
    assert!(!results[0].is_drift);
    assert_eq!(results[0].p_value, None);
}

#[test]
fn test_psi_increases_with_mean_shift() {
    let detector = single_feature_detector(normal_grid(1000, 0.0, 1.0), DriftMethod::Psi);

    let mut previous = 0.0;
    for shift in [0.1, 0.25, 0.5, 1.0, 2.0] {
        let results = detector
            .detect(&single_feature_batch("x", normal_grid(1000, shift, 1.0)))
            .unwrap();
        let psi = results[0].statistic.unwrap();
        assert!(psi > previous, "PSI {} at shift {} not above {}", psi, shift, previous);
        previous = psi;
    }
    // A two-sigma shift is well past the drift threshold
    assert!(previous > 0.25);
}

#[test]
fn test_psi_clamps_values_outside_reference_range() {
    let detector = single_feature_detector(normal_grid(500, 0.0, 1.0), DriftMethod::Psi);
    let results = detector
        .detect(&single_feature_batch("x", vec![100.0; 50]))
        .unwrap();
    let psi = results[0].statistic.unwrap();
    assert!(psi.is_finite());
    assert!(results[0].is_drift);
}

#[test]
fn test_js_symmetric_and_bounded() {
    let a = normal_grid(600, 0.0, 1.0);
    let b = normal_grid(400, 1.5, 2.0);

    let ab = single_feature_detector(a.clone(), DriftMethod::Js)
        .detect(&single_feature_batch("x", b.clone()))
        .unwrap()[0]
        .statistic
        .unwrap();
    let ba = single_feature_detector(b, DriftMethod::Js)
        .detect(&single_feature_batch("x", a.clone()))
        .unwrap()[0]
        .statistic
        .unwrap();

    assert!((ab - ba).abs() < 1e-12);
    assert!((0.0..=1.0).contains(&ab));

    let same = stats::jensen_shannon(&a, &a, 50).unwrap();
    assert!(same.abs() < 1e-12);

    let disjoint = stats::jensen_shannon(&a, &normal_grid(600, 100.0, 1.0), 50).unwrap();
    assert!(disjoint <= 1.0);
    assert!(disjoint > 0.99);
}

#[test]
fn test_js_flags_disjoint_batch() {
    let detector = single_feature_detector(normal_grid(600, 0.0, 1.0), DriftMethod::Js);
    let results = detector
        .detect(&single_feature_batch("x", normal_grid(600, 100.0, 1.0)))
        .unwrap();

    let result = &results[0];
    assert!(result.statistic.unwrap() > 0.5);
    assert!(result.is_drift);
    assert_eq!(result.severity, DriftSeverity::Significant);
    assert_eq!(result.p_value, None);
    assert_eq!(result.method, DriftMethod::Js);
}

#[test]
fn test_js_mild_shift_is_not_drift() {
    let detector = single_feature_detector(normal_grid(600, 0.0, 1.0), DriftMethod::Js);
    let results = detector
        .detect(&single_feature_batch("x", normal_grid(600, 0.2, 1.0)))
        .unwrap();

    let result = &results[0];
    let statistic = result.statistic.unwrap();
    assert!(statistic > 0.0 && statistic <= 0.5, "statistic was {}", statistic);
    assert!(!result.is_drift);
    assert_eq!(result.severity, DriftSeverity::None);
}

#[test]
fn test_chi_square_p_value_at_significance_boundary() {
    // Statistic just under the 95th percentile for one degree of freedom
    let p_value = stats::chi_square_p_value(3.84, 1);
    assert!(p_value > 0.05, "p-value was {}", p_value);
    assert!((stats::chi_square_p_value(3.841459, 1) - 0.05).abs() < 1e-6);
}

#[test]
fn test_oversized_histogram_bins_rejected() {
    for config in [
        DriftConfig {
            psi_bins: 1_000_000_000_000,
            ..DriftConfig::default()
        },
        DriftConfig {
            js_bins: MAX_HISTOGRAM_BINS + 1,
            ..DriftConfig::default()
        },
    ] {
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration_error());
    }

    let at_limit = DriftConfig {
        psi_bins: MAX_HISTOGRAM_BINS,
        ..DriftConfig::default()
    };
    assert!(at_limit.validate().is_ok());
}

#[test]
fn test_chi_square_on_category_codes() {
    let reference: Vec<f64> = (0..900).map(|i| (i % 3) as f64).collect();
    let detector = single_feature_detector(reference.clone(), DriftMethod::ChiSquare);

    let same = detector
        .detect(&single_feature_batch("x", reference))
        .unwrap();
    assert!(!same[0].is_drift);

    // Category 2 disappears, a new category 3 shows up
    let shifted: Vec<f64> = (0..900)
        .map(|i| if i % 3 == 2 { 3.0 } else { (i % 3) as f64 })
        .collect();
    let drifted = detector
        .detect(&single_feature_batch("x", shifted))
        .unwrap();
    assert!(drifted[0].is_drift);
    assert_eq!(drifted[0].method, DriftMethod::ChiSquare);
}

#[test]
fn test_results_follow_feature_order() {
    let reference = ReferenceDistribution::from_columns(vec![
        normal_grid(300, 0.0, 1.0),
        normal_grid(300, 10.0, 1.0),
        normal_grid(300, -5.0, 2.0),
    ])
    .unwrap();
    let detector =
        DriftDetector::new(reference, names(&["age", "income", "score"]), 0.05, DriftMethod::Ks)
            .unwrap();

    let batch = FeatureBatch::from_columns(
        names(&["age", "income", "score"]),
        vec![
            normal_grid(300, 0.0, 1.0),
            normal_grid(300, 13.0, 1.0),
            normal_grid(300, -5.0, 2.0),
        ],
    )
    .unwrap();
    let results = detector.detect(&batch).unwrap();

    let features: Vec<&str> = results.iter().map(|r| r.feature.as_str()).collect();
    assert_eq!(features, vec!["age", "income", "score"]);
    assert!(!results[0].is_drift);
    assert!(results[1].is_drift);
    assert!(!results[2].is_drift);

    let summary = DriftDetector::summarize(&results);
    assert_eq!(summary.drifted_features, 1);
    assert!(summary.has_drift());
}

#[test]
fn test_schema_mismatch_rejected() {
    let detector = single_feature_detector(normal_grid(100, 0.0, 1.0), DriftMethod::Ks);
    let batch = FeatureBatch::new(names(&["x", "y"]), vec![vec![0.0, 1.0]]);
    let err = detector.detect(&batch).unwrap_err();
    assert!(err.is_schema_error());
    assert!(matches!(err, MonitorError::SchemaMismatch { expected: 1, actual: 2 }));

    let ragged = FeatureBatch::new(names(&["x"]), vec![vec![0.0], vec![]]);
    assert!(matches!(
        detector.detect(&ragged),
        Err(MonitorError::RowWidthMismatch { row: 1, .. })
    ));
}

#[test]
fn test_empty_batch_is_insufficient_for_every_method() {
    for method in [DriftMethod::Ks, DriftMethod::Psi, DriftMethod::Js, DriftMethod::ChiSquare] {
        let detector = single_feature_detector(normal_grid(100, 0.0, 1.0), method);
        let results = detector.detect(&single_feature_batch("x", vec![])).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].insufficient_data, "{} should be insufficient", method);
        assert_eq!(results[0].statistic, None);
        assert!(!results[0].is_drift);
    }
}

#[test]
fn test_non_finite_values_are_dropped() {
    let detector = single_feature_detector(normal_grid(500, 0.0, 1.0), DriftMethod::Ks);
    let mut values = normal_grid(500, 0.0, 1.0);
    values.push(f64::NAN);
    values.push(f64::INFINITY);
    let results = detector.detect(&single_feature_batch("x", values)).unwrap();
    assert_eq!(results[0].sample_size, 500);
    assert!(!results[0].is_drift);
}

#[test]
fn test_concurrent_detection() {
    let detector = Arc::new(single_feature_detector(normal_grid(500, 0.0, 1.0), DriftMethod::Ks));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let detector = detector.clone();
            thread::spawn(move || {
                let shift = if i % 2 == 0 { 0.0 } else { 3.0 };
                let results = detector
                    .detect(&single_feature_batch("x", normal_grid(200, shift, 1.0)))
                    .unwrap();
                (shift, results[0].is_drift)
            })
        })
        .collect();

    for handle in handles {
        let (shift, is_drift) = handle.join().unwrap();
        assert_eq!(is_drift, shift > 0.0);
    }
}
