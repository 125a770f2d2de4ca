//! Robust low-outlier thresholds for distance samples.

mod hampel;
mod interpolate;
mod montecarlo;

pub use hampel::{
    DEFAULT_ALPHAS, EPSILON, analytic_k, hampel, hampel_thresholds, hampel_with_k, madn, median,
};
pub use interpolate::Interpolator;
pub use montecarlo::{GaussianPool, montecarlo_grid, montecarlo_k, percentile};

#[cfg(test)]
mod tests;
