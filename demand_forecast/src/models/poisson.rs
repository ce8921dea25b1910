//! Poisson regression (log link) for count data; the imputer's model.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::StandardScaler;
use retail_math::regression::{fit_poisson, Coefficients, SolverConfig};

/// Linear term bound applied before exponentiation, mirroring the
/// solver's own guard.
const MAX_LOG_RATE: f64 = 30.0;

/// Untrained Poisson regression specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoissonRegression {
    pub solver: SolverConfig,
}

impl PoissonRegression {
    pub fn new(solver: SolverConfig) -> Self {
        Self { solver }
    }

    /// Fit on a row-major feature matrix and non-negative count targets.
    pub fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> Result<TrainedPoissonRegression> {
        let scaler = StandardScaler::fit(rows)?;
        let standardized = scaler.transform_matrix(rows);
        let coef = fit_poisson(&standardized, targets, &self.solver)?;
        Ok(TrainedPoissonRegression { scaler, coef })
    }
}

impl Default for PoissonRegression {
    fn default() -> Self {
        Self {
            solver: SolverConfig {
                iterations: 300,
                learning_rate: 0.05,
                l2: 1e-3,
            },
        }
    }
}

/// Fitted Poisson regression; predicts the expected count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedPoissonRegression {
    scaler: StandardScaler,
    coef: Coefficients,
}

impl TrainedPoissonRegression {
    pub fn width(&self) -> usize {
        self.scaler.width()
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let eta = self.coef.linear_term(&self.scaler.transform(row));
        eta.clamp(-MAX_LOG_RATE, MAX_LOG_RATE).exp()
    }
}
