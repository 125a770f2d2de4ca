use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{Error, Result};

use super::hampel::{madn_about, median_of_sorted};
use super::interpolate::Interpolator;

/// A reusable block of unit-Gaussian draws. Each fill copies a window that
/// starts at a random offset and wraps around the end.
#[derive(Debug, Clone)]
pub struct GaussianPool {
    samples: Vec<f64>,
    offset: usize,
}

impl GaussianPool {
    pub fn new<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Self {
        let samples: Vec<f64> = (0..size.max(1))
            .map(|_| StandardNormal.sample(rng))
            .collect();
        Self { samples, offset: 0 }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn fill<R: Rng + ?Sized>(&mut self, dest: &mut [f64], rng: &mut R) {
        let len = self.samples.len();
        self.offset = (self.offset + rng.gen_range(0..len)) % len;
        let mut written = 0;
        while written < dest.len() {
            let take = (len - self.offset).min(dest.len() - written);
            dest[written..written + take]
                .copy_from_slice(&self.samples[self.offset..self.offset + take]);
            written += take;
            self.offset = (self.offset + take) % len;
        }
    }
}

/// Percentile with the `(n + 1)` position rule: positions below the first
/// sample give the minimum, past the last give the maximum, anything else
/// interpolates linearly between neighbours.
pub fn percentile(values: &[f64], p: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(Error::EmptySample);
    }
    if !(p > 0.0 && p <= 100.0) {
        return Err(Error::InvalidConfig {
            kind: "percentile".to_string(),
            message: format!("{p} is outside (0, 100]"),
        });
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n == 1 {
        return Ok(sorted[0]);
    }

    let pos = p * (n as f64 + 1.0) / 100.0;
    if pos < 1.0 {
        return Ok(sorted[0]);
    }
    if pos >= n as f64 {
        return Ok(sorted[n - 1]);
    }
    let floor = pos.floor();
    let lower = sorted[floor as usize - 1];
    let upper = sorted[floor as usize];
    Ok(lower + (pos - floor) * (upper - lower))
}

/// Empirical critical value: the `1 - alpha` percentile of
/// `(max |x| - median) / MADN` over `trials` Gaussian samples of size `n`.
pub fn montecarlo_k<R: Rng + ?Sized>(
    n: usize,
    alpha: f64,
    trials: usize,
    pool: &mut GaussianPool,
    rng: &mut R,
) -> Result<f64> {
    if n == 0 || trials == 0 {
        return Err(Error::EmptySample);
    }
    let mut draw = vec![0.0f64; n];
    let mut statistics = Vec::with_capacity(trials);
    for _ in 0..trials {
        pool.fill(&mut draw, rng);
        draw.sort_by(f64::total_cmp);
        let med = median_of_sorted(&draw);
        let spread = madn_about(&draw, med);
        let max_abs = draw.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        statistics.push((max_abs - med) / spread);
    }
    percentile(&statistics, 100.0 * (1.0 - alpha))
}

/// Tabulates [`montecarlo_k`] over sample sizes and alphas into a grid
/// indexed `(n, alpha)`.
pub fn montecarlo_grid<R: Rng + ?Sized>(
    sizes: &[usize],
    alphas: &[f64],
    trials: usize,
    rng: &mut R,
) -> Result<Interpolator> {
    let largest = sizes.iter().copied().max().unwrap_or(0);
    let mut pool = GaussianPool::new((largest * 4).max(1 << 16), rng);
    let mut values = Vec::with_capacity(sizes.len() * alphas.len());
    for &n in sizes {
        for &alpha in alphas {
            values.push(montecarlo_k(n, alpha, trials, &mut pool, rng)?);
        }
    }
    Interpolator::new(
        vec![
            sizes.iter().map(|&n| n as f64).collect(),
            alphas.to_vec(),
        ],
        values,
    )
}
