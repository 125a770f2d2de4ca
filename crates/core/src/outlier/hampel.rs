use crate::error::{Error, Result};

/// Keeps thresholds strictly inside the distance range.
pub const EPSILON: f64 = 1e-6;

pub const DEFAULT_ALPHAS: [f64; 2] = [0.01, 0.05];

const MAD_TO_SD: f64 = 0.6745;

fn sorted_finite(values: &[f64]) -> Result<Vec<f64>> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return Err(Error::EmptySample);
    }
    sorted.sort_by(f64::total_cmp);
    Ok(sorted)
}

pub(crate) fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

pub(crate) fn madn_about(values: &[f64], center: f64) -> f64 {
    let mut deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    deviations.sort_by(f64::total_cmp);
    median_of_sorted(&deviations) / MAD_TO_SD
}

/// Median, ignoring NaN entries.
pub fn median(values: &[f64]) -> Result<f64> {
    Ok(median_of_sorted(&sorted_finite(values)?))
}

/// Median absolute deviation scaled to estimate a standard deviation.
pub fn madn(values: &[f64]) -> Result<f64> {
    let sorted = sorted_finite(values)?;
    Ok(madn_about(&sorted, median_of_sorted(&sorted)))
}

/// Closed-form critical value for `n` samples at false-positive rate `alpha`.
/// Only 0.01 and 0.05 are tabulated.
pub fn analytic_k(n: usize, alpha: f64) -> Result<f64> {
    let n_f = n as f64;
    let log_n = n_f.ln();
    let s = (2.0 * log_n).sqrt();
    let z = s - (alpha / 2.0).ln() / s - (log_n.ln() + (4.0 * std::f64::consts::PI).ln()) / (2.0 * s);
    let even = n % 2 == 0;

    if (alpha - 0.05).abs() < 1e-12 {
        Ok(if even {
            1.483 * z + 21.61 * (n_f + 1.0).powf(-0.8655)
        } else {
            1.483 * z + 14.43 * (n_f - 3.0).powf(-0.7939)
        })
    } else if (alpha - 0.01).abs() < 1e-12 {
        Ok(if even {
            1.483 * z + 41.39 * n_f.powf(-0.9143)
        } else {
            1.483 * z + 24.48 * (n_f - 5.0).powf(-0.8236)
        })
    } else {
        Err(Error::UnsupportedAlpha(alpha))
    }
}

/// `median - k * MADN`, clamped to `[EPSILON, 1 - EPSILON]`.
pub fn hampel_with_k(k: f64, sample: &[f64]) -> Result<f64> {
    let sorted = sorted_finite(sample)?;
    let m = median_of_sorted(&sorted);
    let s = madn_about(&sorted, m);
    let raw = if s == 0.0 { m } else { m - k * s };
    if raw.is_nan() {
        return Ok(EPSILON);
    }
    Ok(raw.clamp(EPSILON, 1.0 - EPSILON))
}

/// Hampel threshold with `k` taken for the number of non-NaN values.
pub fn hampel(sample: &[f64], alpha: f64) -> Result<f64> {
    let sorted = sorted_finite(sample)?;
    let k = analytic_k(sorted.len(), alpha)?;
    hampel_with_k(k, &sorted)
}

/// `(alpha, threshold)` for each of [`DEFAULT_ALPHAS`].
pub fn hampel_thresholds(sample: &[f64]) -> Result<Vec<(f64, f64)>> {
    DEFAULT_ALPHAS
        .iter()
        .map(|&alpha| Ok((alpha, hampel(sample, alpha)?)))
        .collect()
}
