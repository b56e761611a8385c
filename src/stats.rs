use nalgebra::{DMatrix, DVector};

use crate::error::{Result, SupereegError};

/// Correlations are clipped to this magnitude before the Fisher transform so
/// that perfectly (anti-)correlated pairs stay finite.
pub const MAX_ABS_CORRELATION: f64 = 1.0 - 1e-12;

/// Pearson correlation between every pair of columns of a samples x channels matrix.
///
/// A pair involving a zero-variance channel is undefined and comes back as NaN,
/// including that channel's diagonal entry. Flatness is decided on the raw
/// samples, since centering a constant column can leave rounding residue.
pub fn correlation_matrix(data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n_samples = data.nrows();
    let n_channels = data.ncols();
    if n_samples < 2 {
        return Err(SupereegError::InvalidParameter(format!(
            "correlation needs at least 2 samples, got {}",
            n_samples
        )));
    }

    let means: DVector<f64> = DVector::from_iterator(
        n_channels,
        data.column_iter().map(|col| col.sum() / n_samples as f64),
    );
    let centered = DMatrix::from_fn(n_samples, n_channels, |r, c| data[(r, c)] - means[c]);
    let scatter = centered.transpose() * &centered;

    let flat: Vec<bool> = data
        .column_iter()
        .map(|col| col.max() == col.min())
        .collect();
    let norms: Vec<f64> = (0..n_channels).map(|c| scatter[(c, c)].sqrt()).collect();
    let corr = DMatrix::from_fn(n_channels, n_channels, |i, j| {
        let denom = norms[i] * norms[j];
        if !flat[i] && !flat[j] && denom > 0.0 && denom.is_finite() {
            (scatter[(i, j)] / denom).clamp(-1.0, 1.0)
        } else {
            f64::NAN
        }
    });

    Ok(corr)
}

/// Fisher z-transform; NaN stays NaN
pub fn r_to_z(r: f64) -> f64 {
    r.clamp(-MAX_ABS_CORRELATION, MAX_ABS_CORRELATION).atanh()
}

pub fn z_to_r(z: f64) -> f64 {
    z.tanh()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_correlation() {
        let data = DMatrix::from_row_slice(
            4,
            3,
            &[1.0, 2.0, 4.0, 2.0, 4.0, 3.0, 3.0, 6.0, 2.0, 4.0, 8.0, 1.0],
        );
        let corr = correlation_matrix(&data).unwrap();
        assert!((corr[(0, 1)] - 1.0).abs() < 1e-12);
        assert!((corr[(0, 2)] + 1.0).abs() < 1e-12);
        assert!((corr[(1, 1)] - 1.0).abs() < 1e-12);
        assert_eq!(corr[(0, 2)], corr[(2, 0)]);
    }

    #[test]
    fn test_constant_channel_is_undefined() {
        let data = DMatrix::from_row_slice(3, 2, &[1.0, 5.0, 2.0, 5.0, 3.0, 5.0]);
        let corr = correlation_matrix(&data).unwrap();
        assert!(corr[(0, 1)].is_nan());
        assert!(corr[(1, 1)].is_nan());
        assert!((corr[(0, 0)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_channel_at_offset_is_undefined() {
        let data = DMatrix::from_row_slice(3, 2, &[1.0, 0.1, 2.5, 0.1, 3.0, 0.1]);
        let corr = correlation_matrix(&data).unwrap();
        assert!(corr[(0, 1)].is_nan());
        assert!(corr[(1, 0)].is_nan());
        assert!(corr[(1, 1)].is_nan());
        assert!((corr[(0, 0)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_samples() {
        let data = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        assert!(correlation_matrix(&data).is_err());
    }

    #[test]
    fn test_fisher_transform() {
        assert_eq!(r_to_z(0.0), 0.0);
        assert!(r_to_z(1.0).is_finite());
        assert!(r_to_z(f64::NAN).is_nan());
        assert!((z_to_r(r_to_z(0.3)) - 0.3).abs() < 1e-12);
    }
}
