// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/monitoring/fixtures.rs - Shared sample generators

use fabstir_model_monitor::monitoring::FeatureBatch;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use statrs::distribution::ContinuousCDF;

/// `n` evenly spaced quantiles of N(mean, std): a deterministic "perfect" sample
pub fn normal_grid(n: usize, mean: f64, std: f64) -> Vec<f64> {
    let dist = statrs::distribution::Normal::new(mean, std).unwrap();
    (0..n)
        .map(|i| dist.inverse_cdf((i as f64 + 0.5) / n as f64))
        .collect()
}

/// Seeded N(mean, std) draws
pub fn random_normals(seed: u64, n: usize, mean: f64, std: f64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = rand_distr::Normal::new(mean, std).unwrap();
    (0..n).map(|_| dist.sample(&mut rng)).collect()
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn single_feature_batch(name: &str, values: Vec<f64>) -> FeatureBatch {
    FeatureBatch::new(vec![name.to_string()], values.into_iter().map(|v| vec![v]).collect())
}
