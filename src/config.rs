use serde::{Deserialize, Serialize};

use crate::error::{Result, SupereegError};

/// How self-pairs on the accumulator diagonal are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagonalPolicy {
    /// Diagonal counts observations but materializes to a fixed identity value
    Identity,
    /// Diagonal accumulates like any other cell
    Accumulate,
}

impl Default for DiagonalPolicy {
    fn default() -> Self {
        Self::Identity
    }
}

/// Output space for a materialized model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixSpace {
    /// Pearson correlation coefficients
    Correlation,
    /// Mean Fisher z values
    FisherZ,
}

impl Default for MatrixSpace {
    fn default() -> Self {
        Self::Correlation
    }
}

/// Parameters shared by model construction and aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub diagonal: DiagonalPolicy,
    /// Per-coordinate absolute tolerance for treating two locations as the same point
    pub match_tolerance: f64,
    /// Compute per-object contributions on the rayon pool
    pub parallel: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            diagonal: DiagonalPolicy::default(),
            match_tolerance: 0.0,
            parallel: true,
        }
    }
}

impl ModelConfig {
    pub fn with_diagonal(mut self, diagonal: DiagonalPolicy) -> Self {
        self.diagonal = diagonal;
        self
    }

    pub fn with_match_tolerance(mut self, match_tolerance: f64) -> Self {
        self.match_tolerance = match_tolerance;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.match_tolerance.is_finite() || self.match_tolerance < 0.0 {
            return Err(SupereegError::InvalidParameter(format!(
                "match_tolerance must be finite and non-negative, got {}",
                self.match_tolerance
            )));
        }
        Ok(())
    }
}
