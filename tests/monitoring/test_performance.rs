// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/monitoring/test_performance.rs

use fabstir_model_monitor::metrics::names::{ACCURACY, DEGRADATION_DETECTED_TOTAL, LABELED_SAMPLES};
use fabstir_model_monitor::metrics::{InMemorySink, NullSink};
use fabstir_model_monitor::monitoring::{LabelResolution, PerformanceMonitor};
use std::sync::Arc;
use std::thread;

fn monitor_with_accuracy(correct: usize, total: usize) -> PerformanceMonitor {
    let monitor = PerformanceMonitor::new("fraud-v2", 100, Arc::new(NullSink)).unwrap();
    for i in 0..total {
        let truth = (i % 2) as i64;
        let prediction = if i < correct { truth } else { 1 - truth };
        monitor.log_prediction(prediction, Some(truth), None);
    }
    monitor
}

#[test]
fn test_metrics_absent_below_min_samples() {
    let monitor = monitor_with_accuracy(99, 99);
    assert!(monitor.calculate_metrics().is_none());

    monitor.log_prediction(1, Some(1), None);
    let snapshot = monitor.calculate_metrics().unwrap();
    assert_eq!(snapshot.sample_count, 100);
    assert_eq!(snapshot.accuracy, 1.0);
    assert_eq!(snapshot.f1_score, 1.0);
}

#[test]
fn test_unlabeled_predictions_do_not_count() {
    let monitor = PerformanceMonitor::new("m", 100, Arc::new(NullSink)).unwrap();
    for _ in 0..500 {
        monitor.log_prediction(1, None, None);
    }
    assert_eq!(monitor.labeled_count(), 0);
    assert_eq!(monitor.pending_count(), 500);
    assert!(monitor.calculate_metrics().is_none());
}

#[test]
fn test_degradation_boundary() {
    // 80 of 100 correct: exactly a 0.10 drop from 0.90
    assert!(monitor_with_accuracy(80, 100).check_degradation(0.90, 0.10));
    assert!(monitor_with_accuracy(75, 100).check_degradation(0.90, 0.10));
    assert!(!monitor_with_accuracy(81, 100).check_degradation(0.90, 0.10));
}

#[test]
fn test_degradation_false_without_enough_labels() {
    let monitor = monitor_with_accuracy(0, 50);
    assert!(!monitor.check_degradation(0.99, 0.01));
}

#[test]
fn test_degradation_is_counted() {
    let sink = Arc::new(InMemorySink::new());
    let monitor = PerformanceMonitor::new("fraud-v2", 10, sink.clone()).unwrap();
    for i in 0..10 {
        monitor.log_prediction(0, Some(if i < 5 { 0 } else { 1 }), None);
    }

    assert!(monitor.check_degradation(0.95, 0.1));
    let labels = [("model", "fraud-v2")];
    assert_eq!(sink.counter(DEGRADATION_DETECTED_TOTAL, &labels), 1.0);
    assert_eq!(sink.gauge(ACCURACY, &labels), Some(0.5));
    assert_eq!(sink.gauge(LABELED_SAMPLES, &labels), Some(10.0));
}

#[test]
fn test_delayed_ground_truth() {
    let monitor = PerformanceMonitor::new("m", 3, Arc::new(NullSink)).unwrap();
    let ids: Vec<String> = (0..3).map(|i| monitor.log_prediction(i, None, None)).collect();
    assert!(monitor.calculate_metrics().is_none());

    for (i, id) in ids.iter().enumerate() {
        assert_eq!(monitor.add_ground_truth(id, i as i64), LabelResolution::Attached);
    }
    let snapshot = monitor.calculate_metrics().unwrap();
    assert_eq!(snapshot.accuracy, 1.0);
    assert_eq!(monitor.pending_count(), 0);
}

#[test]
fn test_unknown_correlation_id_is_reported_not_raised() {
    let monitor = PerformanceMonitor::new("m", 1, Arc::new(NullSink)).unwrap();
    monitor.log_prediction(1, None, Some("known"));
    assert_eq!(
        monitor.add_ground_truth("unknown", 1),
        LabelResolution::UnknownCorrelationId
    );
    assert_eq!(monitor.labeled_count(), 0);
}

#[test]
fn test_weighted_metrics_multiclass() {
    let monitor = PerformanceMonitor::new("m", 1, Arc::new(NullSink)).unwrap();
    // truth 0 x3 (two right), truth 1 x1 (right), truth 2 x1 (wrong, predicted 0)
    for (prediction, truth) in [(0, 0), (0, 0), (1, 0), (1, 1), (0, 2)] {
        monitor.log_prediction(prediction, Some(truth), None);
    }
    let snapshot = monitor.calculate_metrics().unwrap();
    assert!((snapshot.accuracy - 0.6).abs() < 1e-12);

    // class 0: p=2/3 r=2/3 ; class 1: p=1/2 r=1 ; class 2: p=0 r=0
    let expected_precision = (3.0 * (2.0 / 3.0) + 1.0 * 0.5) / 5.0;
    assert!((snapshot.precision - expected_precision).abs() < 1e-12);
    assert!((snapshot.recall - snapshot.accuracy).abs() < 1e-12);
    assert!((0.0..=1.0).contains(&snapshot.f1_score));

    let cm = monitor.confusion_matrix();
    assert_eq!(cm.classes(), &[0, 1, 2]);
    assert_eq!(cm.get(2, 0), 1);
}

#[test]
fn test_concurrent_logging() {
    let monitor = Arc::new(PerformanceMonitor::new("m", 100, Arc::new(NullSink)).unwrap());

    thread::scope(|scope| {
        for t in 0..8 {
            let monitor = monitor.clone();
            scope.spawn(move || {
                for i in 0..100 {
                    let id = format!("t{}-{}", t, i);
                    monitor.log_prediction(1, None, Some(&id));
                    monitor.add_ground_truth(&id, 1);
                }
            });
        }
    });

    assert_eq!(monitor.prediction_count(), 800);
    assert_eq!(monitor.labeled_count(), 800);
    assert_eq!(monitor.calculate_metrics().unwrap().accuracy, 1.0);
}
