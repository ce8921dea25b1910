//! Regression models for demand and lead-time prediction
//!
//! Both models standardize their inputs column-wise and delegate the
//! numerical fitting to the deterministic solvers in [`retail_math`],
//! so identical training data always yields identical parameters.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use retail_math::stats::column_moments;

pub mod linear;
pub mod poisson;

pub use linear::{LinearRegression, TrainedLinearRegression};
pub use poisson::{PoissonRegression, TrainedPoissonRegression};

/// Column-wise standardization fitted on the training matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let (means, stds) = column_moments(rows)?;
        Ok(Self { means, stds })
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter())
            .zip(self.stds.iter())
            .map(|((x, m), s)| (x - m) / s)
            .collect()
    }

    pub fn transform_matrix(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn scaler_centers_and_scales() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0], vec![5.0, 10.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();

        let mid = scaler.transform(&[3.0, 10.0]);
        assert_approx_eq!(mid[0], 0.0);
        // Constant column maps to zero rather than dividing by zero.
        assert_approx_eq!(mid[1], 0.0);

        let hi = scaler.transform(&[5.0, 10.0]);
        assert!(hi[0] > 0.0);
    }
}
