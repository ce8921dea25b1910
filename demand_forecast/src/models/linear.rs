//! Linear regression over standardized features, with an optional
//! log1p target transform for count-like targets.

use serde::{Deserialize, Serialize};

use crate::error::{DemandError, Result};
use crate::models::StandardScaler;
use retail_math::regression::{fit_squared, Coefficients, SolverConfig};

/// Untrained linear regression specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    pub solver: SolverConfig,
    /// Fit against ln(1 + y) and invert with exp(x) - 1 at prediction
    /// time; tames the variance of bursty demand series.
    pub log_target: bool,
}

impl LinearRegression {
    /// Regression on the raw target scale.
    pub fn new(solver: SolverConfig) -> Self {
        Self {
            solver,
            log_target: false,
        }
    }

    /// Regression on the ln(1 + y) scale.
    pub fn log1p(solver: SolverConfig) -> Self {
        Self {
            solver,
            log_target: true,
        }
    }

    /// Fit on a row-major feature matrix and its targets.
    pub fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> Result<TrainedLinearRegression> {
        if self.log_target && targets.iter().any(|t| *t < -1.0 + 1e-12) {
            return Err(DemandError::Validation(
                "log1p targets must be greater than -1".to_string(),
            ));
        }

        let scaler = StandardScaler::fit(rows)?;
        let standardized = scaler.transform_matrix(rows);
        let transformed: Vec<f64> = if self.log_target {
            targets.iter().map(|t| t.ln_1p()).collect()
        } else {
            targets.to_vec()
        };

        let coef = fit_squared(&standardized, &transformed, &self.solver)?;
        Ok(TrainedLinearRegression {
            scaler,
            coef,
            log_target: self.log_target,
        })
    }
}

/// Fitted linear regression. Predictions are clamped at zero: neither
/// demand nor lead time can be negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedLinearRegression {
    scaler: StandardScaler,
    coef: Coefficients,
    log_target: bool,
}

impl TrainedLinearRegression {
    pub fn width(&self) -> usize {
        self.scaler.width()
    }

    /// Model output in link space (before the inverse target transform).
    pub fn link(&self, row: &[f64]) -> f64 {
        self.coef.linear_term(&self.scaler.transform(row))
    }

    fn response(&self, link: f64) -> f64 {
        let raw = if self.log_target { link.exp_m1() } else { link };
        raw.max(0.0)
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.response(self.link(row))
    }

    /// Prediction at the training feature means; the attribution
    /// baseline.
    pub fn baseline(&self) -> f64 {
        self.response(self.coef.intercept)
    }

    /// Link-space output at the training feature means.
    pub fn intercept(&self) -> f64 {
        self.coef.intercept
    }

    /// Per-feature contributions to the link-space output relative to
    /// the training means. Their sum equals `link(row) - intercept`.
    pub fn link_contributions(&self, row: &[f64]) -> Vec<f64> {
        self.scaler
            .transform(row)
            .iter()
            .zip(self.coef.weights.iter())
            .map(|(x, w)| w * x)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn solver() -> SolverConfig {
        SolverConfig {
            iterations: 600,
            learning_rate: 0.1,
            l2: 0.0,
        }
    }

    #[test]
    fn raw_fit_recovers_trend() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| 3.0 * r[0] + 5.0).collect();

        let model = LinearRegression::new(solver()).fit(&rows, &targets).unwrap();
        assert_approx_eq!(model.predict(&[10.0]), 35.0, 1e-4);
    }

    #[test]
    fn log_fit_is_exact_on_flat_counts() {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![(i % 7) as f64]).collect();
        let targets = vec![10.0; 30];

        let model = LinearRegression::log1p(SolverConfig::default())
            .fit(&rows, &targets)
            .unwrap();
        assert_approx_eq!(model.predict(&[3.0]), 10.0, 0.2);
        assert_approx_eq!(model.baseline(), 10.0, 0.2);
    }

    #[test]
    fn predictions_never_go_negative() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| 10.0 - r[0]).collect();

        let model = LinearRegression::new(solver()).fit(&rows, &targets).unwrap();
        // Far beyond the training range the raw line is deeply negative.
        assert_eq!(model.predict(&[500.0]), 0.0);
    }

    #[test]
    fn contributions_sum_to_link_minus_intercept() {
        let rows: Vec<Vec<f64>> = (0..25)
            .map(|i| vec![i as f64, (i * i) as f64 / 10.0])
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| r[0] * 2.0 + r[1] * 0.5).collect();

        let model = LinearRegression::new(solver()).fit(&rows, &targets).unwrap();
        let probe = vec![7.0, 4.9];
        let sum: f64 = model.link_contributions(&probe).iter().sum();
        assert_approx_eq!(model.link(&probe), sum + model.intercept(), 1e-9);
    }
}
