//! Numerator/denominator accumulator pair
//!
//! The numerator holds the running sum of Fisher z values contributed for each
//! location pair and the denominator holds how many contributions each cell has
//! received. A cell with a zero count has never been observed: its numerator
//! is NaN and it stays missing through every operation, including division.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::config::{DiagonalPolicy, MatrixSpace};
use crate::error::{Result, SupereegError};
use crate::stats::{r_to_z, z_to_r};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorPair {
    numerator: DMatrix<f64>,
    denominator: DMatrix<f64>,
}

/// Missing cells act as the additive identity
fn present(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

impl AccumulatorPair {
    /// An `n x n` pair with no observations
    pub fn empty(n: usize) -> Self {
        Self {
            numerator: DMatrix::from_element(n, n, f64::NAN),
            denominator: DMatrix::zeros(n, n),
        }
    }

    /// Wrap raw matrices, checking shape and count invariants.
    ///
    /// Numerator cells whose count is zero are normalised to NaN.
    pub fn new(numerator: DMatrix<f64>, denominator: DMatrix<f64>) -> Result<Self> {
        if !numerator.is_square() {
            return Err(SupereegError::Shape(format!(
                "numerator must be square, got {}x{}",
                numerator.nrows(),
                numerator.ncols()
            )));
        }
        if numerator.shape() != denominator.shape() {
            return Err(SupereegError::Shape(format!(
                "numerator is {:?} but denominator is {:?}",
                numerator.shape(),
                denominator.shape()
            )));
        }

        let mut numerator = numerator;
        let n = numerator.nrows();
        for i in 0..n {
            for j in 0..n {
                let d = denominator[(i, j)];
                if !d.is_finite() || d < 0.0 {
                    return Err(SupereegError::InvalidParameter(format!(
                        "denominator cell ({}, {}) must be a finite non-negative count, got {}",
                        i, j, d
                    )));
                }
                if d == 0.0 {
                    numerator[(i, j)] = f64::NAN;
                } else if numerator[(i, j)].is_nan() {
                    return Err(SupereegError::InvalidParameter(format!(
                        "numerator cell ({}, {}) is missing but has count {}",
                        i, j, d
                    )));
                }
            }
        }

        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// One subject's contribution from its correlation matrix.
    ///
    /// Every defined correlation is observed once; undefined (NaN) pairs stay
    /// missing.
    pub fn from_correlation(corr: &DMatrix<f64>, diagonal: DiagonalPolicy) -> Result<Self> {
        if !corr.is_square() {
            return Err(SupereegError::Shape(format!(
                "correlation matrix must be square, got {}x{}",
                corr.nrows(),
                corr.ncols()
            )));
        }

        let n = corr.nrows();
        let mut pair = Self::empty(n);
        for i in 0..n {
            for j in 0..n {
                let r = corr[(i, j)];
                if r.is_nan() {
                    continue;
                }
                pair.numerator[(i, j)] = match diagonal {
                    DiagonalPolicy::Identity if i == j => 0.0,
                    _ => r_to_z(r),
                };
                pair.denominator[(i, j)] = 1.0;
            }
        }

        Ok(pair)
    }

    pub fn size(&self) -> usize {
        self.numerator.nrows()
    }

    pub fn numerator(&self) -> &DMatrix<f64> {
        &self.numerator
    }

    pub fn denominator(&self) -> &DMatrix<f64> {
        &self.denominator
    }

    pub fn into_parts(self) -> (DMatrix<f64>, DMatrix<f64>) {
        (self.numerator, self.denominator)
    }

    fn check_same_size(&self, other: &AccumulatorPair) -> Result<()> {
        if self.size() != other.size() {
            return Err(SupereegError::Shape(format!(
                "accumulator sizes differ: {} vs {}",
                self.size(),
                other.size()
            )));
        }
        Ok(())
    }

    /// Scatter this pair into a `size x size` pair; row/column `i` moves to `map[i]`.
    ///
    /// Cells not covered by `map` are unobserved.
    pub fn reindex(&self, map: &[usize], size: usize) -> Result<Self> {
        if map.len() != self.size() {
            return Err(SupereegError::Shape(format!(
                "index map has {} entries for a {}x{} accumulator",
                map.len(),
                self.size(),
                self.size()
            )));
        }
        if let Some(&bad) = map.iter().find(|&&k| k >= size) {
            return Err(SupereegError::Index {
                index: bad,
                len: size,
            });
        }

        let mut out = Self::empty(size);
        for (i, &ri) in map.iter().enumerate() {
            for (j, &rj) in map.iter().enumerate() {
                out.numerator[(ri, rj)] = self.numerator[(i, j)];
                out.denominator[(ri, rj)] = self.denominator[(i, j)];
            }
        }
        Ok(out)
    }

    /// Gather rows/columns `indices` in the given order
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&k| k >= self.size()) {
            return Err(SupereegError::Index {
                index: bad,
                len: self.size(),
            });
        }
        Ok(Self {
            numerator: self.numerator.select_rows(indices).select_columns(indices),
            denominator: self.denominator.select_rows(indices).select_columns(indices),
        })
    }

    pub fn add(&self, other: &AccumulatorPair) -> Result<Self> {
        self.check_same_size(other)?;

        let numerator = self.numerator.zip_map(&other.numerator, |a, b| {
            if a.is_nan() && b.is_nan() {
                f64::NAN
            } else {
                present(a) + present(b)
            }
        });
        let denominator = &self.denominator + &other.denominator;

        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn subtract(&self, other: &AccumulatorPair) -> Result<Self> {
        self.check_same_size(other)?;

        let denominator = &self.denominator - &other.denominator;
        let n = self.size();
        for i in 0..n {
            for j in 0..n {
                if denominator[(i, j)] < 0.0 {
                    return Err(SupereegError::NegativeWeight { row: i, col: j });
                }
            }
        }

        let mut numerator = self
            .numerator
            .zip_map(&other.numerator, |a, b| present(a) - present(b));
        numerator.zip_apply(&denominator, |num, d| {
            if d == 0.0 {
                *num = f64::NAN;
            }
        });

        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Indices whose self-pair has been observed at least once
    pub fn observed_indices(&self) -> Vec<usize> {
        (0..self.size())
            .filter(|&i| self.denominator[(i, i)] > 0.0)
            .collect()
    }

    /// Divide numerator by denominator.
    ///
    /// Unobserved cells come back as NaN. Under `DiagonalPolicy::Identity` the
    /// diagonal is fixed to 1 (correlation) or +inf (Fisher z).
    pub fn materialize(&self, diagonal: DiagonalPolicy, space: MatrixSpace) -> DMatrix<f64> {
        let n = self.size();
        DMatrix::from_fn(n, n, |i, j| {
            if i == j && diagonal == DiagonalPolicy::Identity {
                return match space {
                    MatrixSpace::Correlation => 1.0,
                    MatrixSpace::FisherZ => f64::INFINITY,
                };
            }
            let d = self.denominator[(i, j)];
            if d == 0.0 {
                return f64::NAN;
            }
            let mean_z = self.numerator[(i, j)] / d;
            match space {
                MatrixSpace::Correlation => z_to_r(mean_z),
                MatrixSpace::FisherZ => mean_z,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(num: &[f64], den: &[f64]) -> AccumulatorPair {
        let n = (num.len() as f64).sqrt() as usize;
        AccumulatorPair::new(
            DMatrix::from_row_slice(n, n, num),
            DMatrix::from_row_slice(n, n, den),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_is_all_missing() {
        let p = AccumulatorPair::empty(3);
        assert!(p.numerator().iter().all(|v| v.is_nan()));
        assert!(p.denominator().iter().all(|&v| v == 0.0));
        assert!(p.observed_indices().is_empty());
    }

    #[test]
    fn test_new_normalises_unobserved_numerator() {
        let p = pair(&[0.0, 5.0, 5.0, 0.0], &[1.0, 0.0, 0.0, 1.0]);
        assert!(p.numerator()[(0, 1)].is_nan());
        assert_eq!(p.numerator()[(0, 0)], 0.0);
    }

    #[test]
    fn test_new_rejects_bad_shapes() {
        let result = AccumulatorPair::new(DMatrix::zeros(2, 3), DMatrix::zeros(2, 3));
        assert!(matches!(result, Err(SupereegError::Shape(_))));
        let result = AccumulatorPair::new(DMatrix::zeros(2, 2), DMatrix::zeros(3, 3));
        assert!(matches!(result, Err(SupereegError::Shape(_))));
    }

    #[test]
    fn test_new_rejects_negative_counts() {
        let result = AccumulatorPair::new(DMatrix::zeros(1, 1), DMatrix::from_element(1, 1, -1.0));
        assert!(matches!(result, Err(SupereegError::InvalidParameter(_))));
    }

    #[test]
    fn test_add_missing_is_identity() {
        let nan = f64::NAN;
        let a = pair(&[0.0, 0.5, 0.5, 0.0], &[1.0, 1.0, 1.0, 1.0]);
        let b = pair(&[0.0, nan, nan, 0.0], &[1.0, 0.0, 0.0, 1.0]);
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.numerator()[(0, 1)], 0.5);
        assert_eq!(sum.denominator()[(0, 1)], 1.0);
        assert_eq!(sum.denominator()[(0, 0)], 2.0);

        let both_missing = b.add(&b).unwrap();
        assert!(both_missing.numerator()[(0, 1)].is_nan());
    }

    #[test]
    fn test_subtract_back_to_missing() {
        let a = pair(&[0.0, 0.5, 0.5, 0.0], &[1.0, 1.0, 1.0, 1.0]);
        let zero = a.subtract(&a).unwrap();
        assert!(zero.numerator().iter().all(|v| v.is_nan()));
        assert!(zero.denominator().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_subtract_negative_weight() {
        let a = pair(&[0.0, 0.5, 0.5, 0.0], &[1.0, 1.0, 1.0, 1.0]);
        let twice = a.add(&a).unwrap();
        assert_eq!(
            a.subtract(&twice),
            Err(SupereegError::NegativeWeight { row: 0, col: 0 })
        );
    }

    #[test]
    fn test_reindex_preserves_values() {
        let a = pair(&[0.0, 0.25, 0.25, 0.0], &[1.0, 2.0, 2.0, 1.0]);
        let r = a.reindex(&[2, 0], 3).unwrap();
        assert_eq!(r.numerator()[(2, 0)], 0.25);
        assert_eq!(r.denominator()[(0, 2)], 2.0);
        assert_eq!(r.denominator()[(1, 1)], 0.0);
        assert!(r.numerator()[(1, 0)].is_nan());
        assert_eq!(r.select(&[2, 0]).unwrap(), a);
    }

    #[test]
    fn test_materialize() {
        let z = r_to_z(0.5);
        let a = pair(&[0.0, 2.0 * z, 2.0 * z, 0.0], &[2.0, 2.0, 2.0, 2.0]);
        let m = a.materialize(DiagonalPolicy::Identity, MatrixSpace::Correlation);
        assert_eq!(m[(0, 0)], 1.0);
        assert!((m[(0, 1)] - 0.5).abs() < 1e-12);

        let mz = a.materialize(DiagonalPolicy::Identity, MatrixSpace::FisherZ);
        assert_eq!(mz[(1, 1)], f64::INFINITY);
        assert!((mz[(1, 0)] - z).abs() < 1e-12);

        let ma = a.materialize(DiagonalPolicy::Accumulate, MatrixSpace::Correlation);
        assert_eq!(ma[(0, 0)], 0.0);
    }

    #[test]
    fn test_from_correlation_diagonal_policy() {
        let corr = DMatrix::from_row_slice(2, 2, &[1.0, 0.2, 0.2, 1.0]);
        let identity = AccumulatorPair::from_correlation(&corr, DiagonalPolicy::Identity).unwrap();
        assert_eq!(identity.numerator()[(0, 0)], 0.0);
        assert_eq!(identity.denominator()[(0, 0)], 1.0);

        let accumulate =
            AccumulatorPair::from_correlation(&corr, DiagonalPolicy::Accumulate).unwrap();
        assert!(accumulate.numerator()[(0, 0)] > 10.0);
        assert!((accumulate.numerator()[(0, 1)] - r_to_z(0.2)).abs() < 1e-15);
    }
}
