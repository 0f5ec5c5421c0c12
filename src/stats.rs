//! Stateless statistical primitives
//!
//! Every function here is pure and deterministic: no state, no I/O, identical
//! output for identical input. The rest of the engine leans on that — the
//! "largest excursion" and "best window" searches call these repeatedly over
//! window slices and rely on referential transparency.
//!
//! Missing data convention: inputs may contain non-finite values; functions
//! filter them before computing. Degenerate cases return a defined value
//! (`None`, or 0.0 for correlation) rather than NaN or infinity, so
//! downstream comparisons never silently corrupt. Callers that need to tell
//! "true zero correlation" apart from "not enough pairs" must check the pair
//! count via [`valid_pair_count`].

use statrs::statistics::Statistics;

use crate::error::{CalculationError, Result};

/// Arithmetic mean over finite values. `None` when no finite value exists.
pub fn mean(values: &[f64]) -> Option<f64> {
    let finite = finite_values(values);
    if finite.is_empty() {
        return None;
    }
    Some((&finite).mean())
}

/// Sample standard deviation over finite values. Requires n >= 2.
pub fn stdev(values: &[f64]) -> Option<f64> {
    let finite = finite_values(values);
    if finite.len() < 2 {
        return None;
    }
    Some((&finite).std_dev())
}

/// Coefficient of variation (stdev / mean).
///
/// Undefined when the mean is non-positive or fewer than 2 finite values
/// exist; a series of all zeros yields `None`, not an infinity.
pub fn cv(values: &[f64]) -> Option<f64> {
    let finite = finite_values(values);
    if finite.len() < 2 {
        return None;
    }
    let m = (&finite).mean();
    if m <= 0.0 {
        return None;
    }
    Some((&finite).std_dev() / m)
}

/// Linear-interpolation quantile of the finite values, p in [0, 1].
///
/// Empty input yields `None`. p outside [0, 1] is clamped.
pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    let mut finite = finite_values(values);
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).expect("finite values compare"));
    let p = p.clamp(0.0, 1.0);
    let h = p * (finite.len() - 1) as f64;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        return Some(finite[lo]);
    }
    let frac = h - lo as f64;
    Some(finite[lo] + (finite[hi] - finite[lo]) * frac)
}

/// Number of index positions where both series hold a finite value.
pub fn valid_pair_count(x: &[f64], y: &[f64]) -> usize {
    x.iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .count()
}

/// Pearson product-moment correlation.
///
/// Pairs where either side is non-finite are dropped. Returns `Ok(0.0)` when
/// fewer than 2 valid pairs remain or either series has zero variance — a
/// defined sentinel, not a judgment that the series are uncorrelated.
/// Mismatched input lengths are a caller bug and fail fast.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    check_lengths("pearson", x, y)?;
    let (xs, ys) = finite_pairs(x, y);
    Ok(pearson_filtered(&xs, &ys))
}

/// Spearman rank correlation: Pearson on average ranks, ties sharing the
/// mean of their tied positions.
pub fn spearman(x: &[f64], y: &[f64]) -> Result<f64> {
    check_lengths("spearman", x, y)?;
    let (xs, ys) = finite_pairs(x, y);
    if xs.len() < 2 {
        return Ok(0.0);
    }
    let rx = average_ranks(&xs);
    let ry = average_ranks(&ys);
    Ok(pearson_filtered(&rx, &ry))
}

/// Average ranks (1-based) with ties assigned the mean of their positions.
///
/// Input is assumed finite; the correlation wrappers guarantee this.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).expect("finite values compare"));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // positions i..=j hold ties; assign the mean rank
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Ordinary least squares fit result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

/// Ordinary least squares over (x, y) points. Non-finite points are dropped;
/// `None` under 2 points or when x has zero variance.
pub fn linear_regression(points: &[(f64, f64)]) -> Option<Regression> {
    let pts: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if pts.len() < 2 {
        return None;
    }
    let n = pts.len() as f64;
    let mean_x = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in &pts {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some(Regression {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// Winsorize: clip finite values to the `[p, 1-p]` order-statistic bounds.
///
/// Bounds are taken from fixed sorted-array indices rather than interpolated
/// quantiles, which makes the operation idempotent: the values at the bound
/// indices survive the first pass unchanged, so a second pass derives the
/// same bounds. Used before correlating noisy step/HRV pairs to cut outlier
/// leverage. p outside [0, 0.5) returns the finite values unclipped.
pub fn winsorize(values: &[f64], p: f64) -> Vec<f64> {
    let finite = finite_values(values);
    if finite.is_empty() || !(0.0..0.5).contains(&p) {
        return finite;
    }
    let mut sorted = finite.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite values compare"));
    let n = sorted.len();
    let cut = ((p * n as f64).floor() as usize).min((n - 1) / 2);
    let lower = sorted[cut];
    let upper = sorted[n - 1 - cut];
    finite.into_iter().map(|v| v.clamp(lower, upper)).collect()
}

fn finite_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

fn finite_pairs(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .unzip()
}

fn check_lengths(calculation: &str, x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(CalculationError::MismatchedLengths {
            calculation: calculation.to_string(),
            left: x.len(),
            right: y.len(),
        }
        .into());
    }
    Ok(())
}

/// Pearson over pre-filtered, equal-length finite slices.
fn pearson_filtered(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return 0.0;
    }
    sxy / (sxx * syy).sqrt()
}
