#![allow(dead_code)]

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use supereeg_rs::{BrainObject, Location};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `n` distinct locations on a 4-wide grid
pub fn grid_locations(n: usize) -> Vec<Location> {
    (0..n)
        .map(|i| Location::new((i % 4) as f64 * 10.0, (i / 4) as f64 * 10.0, 5.0))
        .collect()
}

/// Simulated session: a shared latent signal mixed into every channel plus
/// channel-specific noise, so channel pairs have non-trivial correlations.
pub fn simulate_subject(seed: u64, locations: Vec<Location>, n_samples: usize) -> BrainObject {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_elecs = locations.len();
    let loadings: Vec<f64> = (0..n_elecs).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let latent: Vec<f64> = (0..n_samples).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let data = DMatrix::from_fn(n_samples, n_elecs, |_, _| rng.gen_range(-0.5..0.5))
        + DMatrix::from_fn(n_samples, n_elecs, |t, c| loadings[c] * latent[t]);

    BrainObject::new(data, locations, 256.0, format!("subject-{}", seed))
        .expect("simulated brain object")
}

pub fn simulate_cohort(n_subjects: usize, n_locations: usize) -> Vec<BrainObject> {
    (0..n_subjects)
        .map(|s| simulate_subject(s as u64 + 1, grid_locations(n_locations), 200))
        .collect()
}

/// Elementwise comparison where NaN only matches NaN
pub fn assert_matrices_close(a: &DMatrix<f64>, b: &DMatrix<f64>, tol: f64) {
    assert_eq!(a.shape(), b.shape(), "matrix shapes differ");
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            let (x, y) = (a[(i, j)], b[(i, j)]);
            if x.is_nan() || y.is_nan() {
                assert!(
                    x.is_nan() && y.is_nan(),
                    "cell ({}, {}) missing on one side only: {} vs {}",
                    i,
                    j,
                    x,
                    y
                );
            } else if x.is_infinite() || y.is_infinite() {
                assert_eq!(x, y, "cell ({}, {})", i, j);
            } else {
                assert!(
                    (x - y).abs() <= tol,
                    "cell ({}, {}) differs: {} vs {}",
                    i,
                    j,
                    x,
                    y
                );
            }
        }
    }
}
