// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Statistical kernels shared by the analyzers
//!
//! All functions are pure and operate on plain slices:
//! - Two-sample Kolmogorov-Smirnov statistic and asymptotic p-value
//! - Equal-width histogram binning on fixed edges
//! - Population Stability Index over binned proportions
//! - Jensen-Shannon divergence (base 2, bounded in [0, 1])
//! - Chi-square goodness of fit for categorical codes
//! - Percentiles with linear interpolation

use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Replacement for empty bins so PSI never takes `ln(0)`
pub const PSI_EPSILON: f64 = 1e-10;

/// Sort a copy of `values`, dropping NaN and infinities
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Largest absolute gap between the empirical CDFs of two sorted samples.
///
/// Ties are handled by stepping both ECDFs past every copy of the current value
/// before comparing them.
pub fn ks_statistic(reference: &[f64], current: &[f64]) -> f64 {
    if reference.is_empty() || current.is_empty() {
        return 0.0;
    }

    let n1 = reference.len() as f64;
    let n2 = current.len() as f64;
    let mut i = 0usize;
    let mut j = 0usize;
    let mut d_max = 0.0f64;

    while i < reference.len() && j < current.len() {
        let x = reference[i].min(current[j]);
        while i < reference.len() && reference[i] <= x {
            i += 1;
        }
        while j < current.len() && current[j] <= x {
            j += 1;
        }
        let gap = (i as f64 / n1 - j as f64 / n2).abs();
        d_max = d_max.max(gap);
    }

    d_max
}

/// Survival function of the Kolmogorov distribution, `P(K > lambda)`
pub fn kolmogorov_survival(lambda: f64) -> f64 {
    // The alternating series does not converge usefully below this point,
    // where the survival probability is 1 to double precision anyway.
    if lambda < 0.2 {
        return 1.0;
    }

    let mut sum = 0.0;
    let mut previous_term = 0.0f64;
    for k in 1..=100 {
        let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
        let term = sign * (-2.0 * f64::from(k).powi(2) * lambda.powi(2)).exp();
        sum += term;
        if term.abs() <= 1e-10 * previous_term.abs() || term.abs() <= 1e-12 * sum.abs() {
            return (2.0 * sum).clamp(0.0, 1.0);
        }
        previous_term = term;
    }

    1.0
}

/// Asymptotic two-sided p-value for a two-sample KS statistic.
///
/// Uses the effective sample size `n1*n2/(n1+n2)` with Stephens' small-sample
/// correction to the scaling factor.
pub fn ks_p_value(statistic: f64, n1: usize, n2: usize) -> f64 {
    if n1 == 0 || n2 == 0 {
        return 1.0;
    }
    let n1 = n1 as f64;
    let n2 = n2 as f64;
    let en = (n1 * n2 / (n1 + n2)).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * statistic;
    kolmogorov_survival(lambda)
}

/// `bins + 1` equal-width edges spanning `[min, max]`.
///
/// A zero-width range is widened by 0.5 on both sides so every value still
/// falls into a bin.
pub fn histogram_edges(min: f64, max: f64, bins: usize) -> Vec<f64> {
    let bins = bins.max(1);
    let (lo, hi) = if max > min {
        (min, max)
    } else {
        (min - 0.5, max + 0.5)
    };
    let width = (hi - lo) / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|i| lo + width * i as f64).collect();
    edges.push(hi);
    edges
}

/// Count values per bin; values outside the edges land in the outer bins
pub fn bin_counts(values: &[f64], edges: &[f64]) -> Vec<usize> {
    if edges.len() < 2 {
        return Vec::new();
    }

    let bins = edges.len() - 1;
    let lo = edges[0];
    let hi = edges[bins];
    let mut counts = vec![0usize; bins];

    for &value in values {
        if !value.is_finite() {
            continue;
        }
        let position = (value - lo) / (hi - lo) * bins as f64;
        let index = if position <= 0.0 {
            0
        } else {
            (position.floor() as usize).min(bins - 1)
        };
        counts[index] += 1;
    }

    counts
}

/// Normalize counts into proportions of `total`
pub fn proportions(counts: &[usize]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts
        .iter()
        .map(|&count| count as f64 / total as f64)
        .collect()
}

/// PSI over two aligned proportion vectors: `sum((cur - ref) * ln(cur / ref))`
pub fn population_stability_index(reference: &[f64], current: &[f64]) -> f64 {
    reference
        .iter()
        .zip(current.iter())
        .map(|(&r, &c)| {
            let r = if r == 0.0 { PSI_EPSILON } else { r };
            let c = if c == 0.0 { PSI_EPSILON } else { c };
            (c - r) * (c / r).ln()
        })
        .sum()
}

/// PSI between two raw samples with edges derived from the reference range.
///
/// Returns `None` if either sample has no finite values.
pub fn psi(reference: &[f64], current: &[f64], bins: usize) -> Option<f64> {
    let reference = sorted_finite(reference);
    let current = sorted_finite(current);
    let (first, last) = (reference.first()?, reference.last()?);
    if current.is_empty() {
        return None;
    }

    let edges = histogram_edges(*first, *last, bins);
    let ref_props = proportions(&bin_counts(&reference, &edges));
    let cur_props = proportions(&bin_counts(&current, &edges));
    Some(population_stability_index(&ref_props, &cur_props))
}

/// Jensen-Shannon divergence (log base 2) between two raw samples.
///
/// Both samples are binned on edges spanning the union of their ranges, so
/// `jensen_shannon(a, b) == jensen_shannon(b, a)`. Returns `None` if either
/// sample has no finite values.
pub fn jensen_shannon(a: &[f64], b: &[f64], bins: usize) -> Option<f64> {
    let a = sorted_finite(a);
    let b = sorted_finite(b);
    let min = a.first()?.min(*b.first()?);
    let max = a.last()?.max(*b.last()?);

    let edges = histogram_edges(min, max, bins);
    let p = proportions(&bin_counts(&a, &edges));
    let q = proportions(&bin_counts(&b, &edges));
    Some(js_divergence(&p, &q))
}

/// Jensen-Shannon divergence between two probability vectors (log base 2)
pub fn js_divergence(p: &[f64], q: &[f64]) -> f64 {
    let mut divergence = 0.0;
    for (&pi, &qi) in p.iter().zip(q.iter()) {
        let mi = 0.5 * (pi + qi);
        if pi > 0.0 {
            divergence += 0.5 * pi * (pi / mi).log2();
        }
        if qi > 0.0 {
            divergence += 0.5 * qi * (qi / mi).log2();
        }
    }
    divergence.clamp(0.0, 1.0)
}

/// Histogram of categorical codes (values rounded to the nearest integer)
pub fn category_counts(values: &[f64]) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &value in values {
        if value.is_finite() {
            *counts.entry(value.round() as i64).or_insert(0) += 1;
        }
    }
    counts
}

/// Chi-square statistic of `current` against the category mix of `reference`.
///
/// Expected frequencies come from reference proportions smoothed with a
/// half-count pseudo-observation per category, so categories never seen in
/// the reference still contribute. Returns `(statistic, degrees_of_freedom)`.
pub fn chi_square(
    reference: &BTreeMap<i64, usize>,
    current: &BTreeMap<i64, usize>,
) -> (f64, usize) {
    let mut categories: Vec<i64> = reference.keys().chain(current.keys()).copied().collect();
    categories.sort_unstable();
    categories.dedup();

    let total_current: usize = current.values().sum();
    if categories.is_empty() || total_current == 0 {
        return (0.0, 0);
    }

    let smoothing = 0.5;
    let total_reference =
        reference.values().sum::<usize>() as f64 + smoothing * categories.len() as f64;

    let mut statistic = 0.0;
    for category in &categories {
        let observed = *current.get(category).unwrap_or(&0) as f64;
        let ref_share =
            (*reference.get(category).unwrap_or(&0) as f64 + smoothing) / total_reference;
        let expected = ref_share * total_current as f64;
        statistic += (observed - expected).powi(2) / expected;
    }

    (statistic, categories.len() - 1)
}

/// Upper-tail probability of `statistic` under a chi-square with `df` degrees of freedom
pub fn chi_square_p_value(statistic: f64, df: usize) -> f64 {
    if df == 0 || statistic.is_nan() || statistic <= 0.0 {
        return 1.0;
    }
    match ChiSquared::new(df as f64) {
        Ok(dist) => dist.sf(statistic).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Percentile `q` in [0, 100] of a sorted sample, linear interpolation
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mu = mean(values);
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
