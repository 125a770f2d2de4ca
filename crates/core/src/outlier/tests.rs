use super::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Error;

#[test]
fn median_and_madn_of_small_samples() {
    assert_eq!(median(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
    assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
    // deviations from 2.5: 1.5 0.5 0.5 1.5 -> median 1.0
    let expected = 1.0 / 0.6745;
    assert!((madn(&[4.0, 1.0, 3.0, 2.0]).unwrap() - expected).abs() < 1e-12);
    assert!(matches!(median(&[]), Err(Error::EmptySample)));
    assert!(matches!(median(&[f64::NAN]), Err(Error::EmptySample)));
}

#[test]
fn analytic_k_follows_the_even_and_odd_formulas() {
    let k_even = analytic_k(100, 0.05).unwrap();
    assert!((k_even - 5.71).abs() < 0.01, "{k_even}");

    let n = 101.0f64;
    let s = (2.0 * n.ln()).sqrt();
    let z = s - (0.005f64).ln() / s - (n.ln().ln() + (4.0 * std::f64::consts::PI).ln()) / (2.0 * s);
    let expected = 1.483 * z + 24.48 * (n - 5.0).powf(-0.8236);
    assert!((analytic_k(101, 0.01).unwrap() - expected).abs() < 1e-12);

    assert!(analytic_k(100, 0.01).unwrap() > k_even);
}

#[test]
fn other_alphas_are_rejected() {
    assert!(matches!(
        analytic_k(50, 0.1),
        Err(Error::UnsupportedAlpha(a)) if a == 0.1
    ));
    assert!(hampel(&[0.5; 10], 0.025).is_err());
}

#[test]
fn identical_samples_fall_back_to_the_median() {
    assert_eq!(hampel(&[0.6; 40], 0.05).unwrap(), 0.6);
    assert_eq!(hampel(&[0.0; 40], 0.05).unwrap(), EPSILON);
    assert_eq!(hampel(&[1.0; 40], 0.01).unwrap(), 1.0 - EPSILON);
}

#[test]
fn nan_entries_do_not_count_towards_k() {
    let sample: Vec<f64> = (0..40).map(|i| 0.80 + f64::from(i) * 0.001).collect();
    let mut with_nan = sample.clone();
    with_nan.insert(7, f64::NAN);

    let expected = hampel_with_k(analytic_k(40, 0.05).unwrap(), &sample).unwrap();
    assert_eq!(hampel(&with_nan, 0.05).unwrap(), expected);
    let miscounted = hampel_with_k(analytic_k(41, 0.05).unwrap(), &sample).unwrap();
    assert_ne!(expected, miscounted);
    assert!(matches!(hampel(&[f64::NAN], 0.05), Err(Error::EmptySample)));
}

#[test]
fn low_outliers_sit_below_the_threshold() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut sample: Vec<f64> = (0..400).map(|_| rng.gen_range(0.70..0.95)).collect();
    sample.extend([0.05, 0.08, 0.1]);
    for (alpha, threshold) in hampel_thresholds(&sample).unwrap() {
        assert!(threshold > 0.1, "alpha {alpha}: {threshold}");
        assert!(threshold < 0.70, "alpha {alpha}: {threshold}");
    }
}

#[test]
fn thresholds_always_stay_in_range() {
    let mut rng = StdRng::seed_from_u64(11);
    for n in [1usize, 2, 3, 4, 5, 6, 9, 30, 257] {
        let sample: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();
        for alpha in DEFAULT_ALPHAS {
            let t = hampel(&sample, alpha).unwrap();
            assert!((EPSILON..=1.0 - EPSILON).contains(&t), "n={n}: {t}");
        }
        let t = hampel_with_k(f64::NAN, &sample).unwrap();
        assert!((EPSILON..=1.0 - EPSILON).contains(&t));
    }
}

#[test]
fn percentile_uses_the_n_plus_one_rule() {
    let v = [5.0, 1.0, 4.0, 2.0, 3.0];
    assert_eq!(percentile(&v, 50.0).unwrap(), 3.0);
    assert_eq!(percentile(&v, 25.0).unwrap(), 1.5);
    assert_eq!(percentile(&v, 10.0).unwrap(), 1.0);
    assert_eq!(percentile(&v, 100.0).unwrap(), 5.0);
    assert_eq!(percentile(&[9.0], 1.0).unwrap(), 9.0);
    assert!(percentile(&v, 0.0).is_err());
    assert!(matches!(percentile(&[], 50.0), Err(Error::EmptySample)));
}

#[test]
fn pool_fills_wrap_around() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut pool = GaussianPool::new(8, &mut rng);
    let mut dest = [0.0f64; 20];
    pool.fill(&mut dest, &mut rng);
    assert!(dest.iter().all(|v| pool.samples().contains(v)));
    let start = pool.samples().iter().position(|&v| v == dest[0]).unwrap();
    for (i, v) in dest.iter().enumerate() {
        assert_eq!(*v, pool.samples()[(start + i) % 8]);
    }
}

#[test]
fn montecarlo_k_is_in_a_plausible_band() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut pool = GaussianPool::new(1 << 14, &mut rng);
    let k = montecarlo_k(50, 0.05, 400, &mut pool, &mut rng).unwrap();
    assert!(k > 1.5 && k < 6.0, "{k}");
    let strict = montecarlo_k(50, 0.01, 400, &mut pool, &mut rng).unwrap();
    assert!(strict > 1.5);
    assert!(montecarlo_k(0, 0.05, 10, &mut pool, &mut rng).is_err());
}

#[test]
fn montecarlo_grid_is_indexed_by_size_then_alpha() {
    let mut rng = StdRng::seed_from_u64(5);
    let grid = montecarlo_grid(&[10, 40], &[0.01, 0.05], 50, &mut rng).unwrap();
    assert_eq!(grid.dims(), 2);
    assert_eq!(grid.values().len(), 4);
    assert_eq!(grid.axes()[0], vec![10.0, 40.0]);
}

fn quadratic_grid() -> Interpolator {
    let ys = vec![1.0, 1.2, 1.5, 2.0, 3.0, 4.0];
    let xs = vec![1.0, 1.1, 2.0, 2.2, 2.5, 3.0, 4.0];
    let mut values = Vec::new();
    for y in &ys {
        for x in &xs {
            values.push(y * y + x);
        }
    }
    Interpolator::new(vec![ys, xs], values).unwrap()
}

#[test]
fn grid_points_are_reproduced_exactly() {
    let grid = quadratic_grid();
    assert_eq!(grid.interpolate(&[1.5, 2.2]).unwrap(), 1.5 * 1.5 + 2.2);
    assert_eq!(grid.interpolate(&[1.0, 1.0]).unwrap(), 2.0);
}

#[test]
fn interpolation_is_linear_between_points() {
    let grid = quadratic_grid();
    // Linear along x, so exact there.
    let v = grid.interpolate(&[2.0, 2.1]).unwrap();
    assert!((v - 6.1).abs() < 1e-12);
    // Chord of y^2 between 1.2 and 1.5 at 1.35 overshoots slightly.
    let v = grid.interpolate(&[1.35, 1.0]).unwrap();
    let chord = (1.44 + 2.25) / 2.0 + 1.0;
    assert!((v - chord).abs() < 1e-12);
}

#[test]
fn three_axes_reproduce_linear_functions() {
    let a = vec![0.0, 1.0, 3.0];
    let b = vec![0.0, 2.0];
    let c = vec![-1.0, 0.0, 1.0, 5.0];
    let mut values = Vec::new();
    for x in &a {
        for y in &b {
            for z in &c {
                values.push(x + 2.0 * y + 3.0 * z);
            }
        }
    }
    let grid = Interpolator::new(vec![a, b, c], values).unwrap();
    let v = grid.interpolate(&[2.5, 0.5, 0.25]).unwrap();
    assert!((v - (2.5 + 1.0 + 0.75)).abs() < 1e-9);
}

#[test]
fn off_grid_coordinates_are_errors() {
    let grid = quadratic_grid();
    assert!(matches!(
        grid.interpolate(&[0.5, 2.0]),
        Err(Error::OffGrid { axis: 0, .. })
    ));
    assert!(matches!(
        grid.interpolate(&[2.0, 4.0]),
        Err(Error::OffGrid { axis: 1, .. })
    ));
    assert!(grid.interpolate(&[2.0]).is_err());
}

#[test]
fn text_format_round_trips() {
    let grid = quadratic_grid();
    let text = grid.to_text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "2");
    assert_eq!(lines.len(), 1 + 2 + 6);
    assert_eq!(Interpolator::from_text(&text).unwrap(), grid);

    let truncated: String = text.lines().take(5).collect::<Vec<_>>().join("\n");
    assert!(matches!(
        Interpolator::from_text(&truncated),
        Err(Error::InvalidGrid(_))
    ));
}

#[test]
fn malformed_grids_are_rejected() {
    assert!(Interpolator::new(vec![vec![1.0, 2.0]], vec![1.0]).is_err());
    assert!(Interpolator::new(vec![vec![2.0, 1.0]], vec![1.0, 2.0]).is_err());
    assert!(Interpolator::new(Vec::new(), Vec::new()).is_err());
}
