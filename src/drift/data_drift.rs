//! Two-sample Kolmogorov-Smirnov test

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Outcome of one two-sample test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KsResult {
    /// Largest absolute gap between the two empirical CDFs
    pub statistic: f64,
    /// Asymptotic two-sided p-value
    pub p_value: f64,
}

/// Two-sample Kolmogorov-Smirnov test for distribution comparison
#[derive(Debug, Clone, Default)]
pub struct KolmogorovSmirnovTest;

impl KolmogorovSmirnovTest {
    pub fn new() -> Self {
        Self
    }

    /// Compare two samples. NaNs are ignored; if either side has no values
    /// left the samples are treated as indistinguishable.
    pub fn test(&self, reference: &[f64], current: &[f64]) -> KsResult {
        let mut a: Vec<f64> = reference.iter().copied().filter(|v| !v.is_nan()).collect();
        let mut b: Vec<f64> = current.iter().copied().filter(|v| !v.is_nan()).collect();

        if a.is_empty() || b.is_empty() {
            return KsResult {
                statistic: 0.0,
                p_value: 1.0,
            };
        }

        a.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));
        b.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));

        let statistic = Self::statistic(&a, &b);
        let p_value = Self::p_value(statistic, a.len(), b.len());
        KsResult { statistic, p_value }
    }

    /// Sweep both sorted samples in step; ties advance both sides together.
    fn statistic(a: &[f64], b: &[f64]) -> f64 {
        let (n1, n2) = (a.len() as f64, b.len() as f64);
        let (mut i, mut j) = (0usize, 0usize);
        let mut d = 0.0f64;

        while i < a.len() && j < b.len() {
            let x = a[i].min(b[j]);
            while i < a.len() && a[i] <= x {
                i += 1;
            }
            while j < b.len() && b[j] <= x {
                j += 1;
            }
            d = d.max((i as f64 / n1 - j as f64 / n2).abs());
        }

        d
    }

    fn p_value(statistic: f64, n1: usize, n2: usize) -> f64 {
        let en = ((n1 * n2) as f64 / (n1 + n2) as f64).sqrt();
        let lambda = (en + 0.12 + 0.11 / en) * statistic;
        kolmogorov_q(lambda)
    }
}

/// Complementary Kolmogorov distribution, `Q(λ) = 2 Σ (-1)^(j-1) exp(-2 j² λ²)`.
///
/// Returns 1.0 when the series fails to converge (small λ).
pub fn kolmogorov_q(lambda: f64) -> f64 {
    const EPS1: f64 = 1e-3;
    const EPS2: f64 = 1e-8;

    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0f64;

    for j in 1..=100 {
        let jf = j as f64;
        let term = fac * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= EPS1 * previous || term.abs() <= EPS2 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        previous = term.abs();
    }

    1.0
}
