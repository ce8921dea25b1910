//! Deterministic gradient-descent solvers for regression models
//!
//! Both solvers run full-batch gradient descent with a fixed iteration
//! count and no random initialization, so a given training matrix always
//! produces bit-identical coefficients. Inputs are expected to be
//! standardized column-wise; see [`crate::stats::column_moments`].

use serde::{Deserialize, Serialize};

use crate::{MathError, Result};

/// Linear term kept below this bound before exponentiation in the
/// Poisson solver, so early iterations cannot overflow.
const MAX_LOG_RATE: f64 = 30.0;

/// Hyperparameters for the gradient-descent solvers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Number of full-batch iterations
    pub iterations: usize,
    /// Step size
    pub learning_rate: f64,
    /// L2 penalty applied to weights (never to the intercept)
    pub l2: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 500,
            learning_rate: 0.1,
            l2: 1e-3,
        }
    }
}

/// Fitted coefficients of a regression model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl Coefficients {
    /// Linear combination of a feature row with these coefficients
    pub fn linear_term(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(row.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

fn validate_training_set(rows: &[Vec<f64>], targets: &[f64]) -> Result<usize> {
    if rows.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot fit a model on an empty training set".to_string(),
        ));
    }
    if rows.len() != targets.len() {
        return Err(MathError::InvalidInput(format!(
            "Row count ({}) does not match target count ({})",
            rows.len(),
            targets.len()
        )));
    }
    let width = rows[0].len();
    if width == 0 {
        return Err(MathError::InvalidInput(
            "Training rows must have at least one feature".to_string(),
        ));
    }
    if rows.iter().any(|r| r.len() != width) {
        return Err(MathError::InvalidInput(
            "All training rows must have the same width".to_string(),
        ));
    }
    Ok(width)
}

/// Fit a linear model under squared loss.
///
/// The intercept is initialized at the target mean, which makes the
/// solver exact on constant targets regardless of iteration count.
pub fn fit_squared(rows: &[Vec<f64>], targets: &[f64], config: &SolverConfig) -> Result<Coefficients> {
    let width = validate_training_set(rows, targets)?;
    let n = rows.len() as f64;

    let mut weights = vec![0.0; width];
    let mut intercept = targets.iter().sum::<f64>() / n;

    for _ in 0..config.iterations {
        let mut grad_w = vec![0.0; width];
        let mut grad_b = 0.0;

        for (row, target) in rows.iter().zip(targets.iter()) {
            let residual = intercept
                + weights
                    .iter()
                    .zip(row.iter())
                    .map(|(w, x)| w * x)
                    .sum::<f64>()
                - target;
            grad_b += residual;
            for (g, x) in grad_w.iter_mut().zip(row.iter()) {
                *g += residual * x;
            }
        }

        intercept -= config.learning_rate * grad_b / n;
        for (w, g) in weights.iter_mut().zip(grad_w.iter()) {
            *w -= config.learning_rate * (g / n + config.l2 * *w);
        }
    }

    if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
        return Err(MathError::CalculationError(
            "Squared-loss solver diverged to non-finite coefficients".to_string(),
        ));
    }

    Ok(Coefficients { weights, intercept })
}

/// Fit a Poisson regression (log link) by minimizing the negative
/// log-likelihood. Targets must be non-negative counts.
pub fn fit_poisson(rows: &[Vec<f64>], targets: &[f64], config: &SolverConfig) -> Result<Coefficients> {
    let width = validate_training_set(rows, targets)?;
    if targets.iter().any(|t| *t < 0.0) {
        return Err(MathError::InvalidInput(
            "Poisson targets must be non-negative".to_string(),
        ));
    }
    let n = rows.len() as f64;

    let mut weights = vec![0.0; width];
    // Start at the log of the mean rate; exact for constant targets.
    let mut intercept = (targets.iter().sum::<f64>() / n).max(1e-9).ln();

    for _ in 0..config.iterations {
        let mut grad_w = vec![0.0; width];
        let mut grad_b = 0.0;

        for (row, target) in rows.iter().zip(targets.iter()) {
            let eta = intercept
                + weights
                    .iter()
                    .zip(row.iter())
                    .map(|(w, x)| w * x)
                    .sum::<f64>();
            let rate = eta.clamp(-MAX_LOG_RATE, MAX_LOG_RATE).exp();
            let residual = rate - target;
            grad_b += residual;
            for (g, x) in grad_w.iter_mut().zip(row.iter()) {
                *g += residual * x;
            }
        }

        intercept -= config.learning_rate * grad_b / n;
        for (w, g) in weights.iter_mut().zip(grad_w.iter()) {
            *w -= config.learning_rate * (g / n + config.l2 * *w);
        }
    }

    if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
        return Err(MathError::CalculationError(
            "Poisson solver diverged to non-finite coefficients".to_string(),
        ));
    }

    Ok(Coefficients { weights, intercept })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn config() -> SolverConfig {
        SolverConfig {
            iterations: 800,
            learning_rate: 0.1,
            l2: 0.0,
        }
    }

    #[test]
    fn squared_loss_recovers_a_line() {
        // y = 2x + 1 on standardized-looking inputs
        let rows: Vec<Vec<f64>> = (-5..=5).map(|i| vec![i as f64 / 5.0]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| 2.0 * r[0] + 1.0).collect();

        let coef = fit_squared(&rows, &targets, &config()).unwrap();
        assert_approx_eq!(coef.weights[0], 2.0, 1e-6);
        assert_approx_eq!(coef.intercept, 1.0, 1e-6);
    }

    #[test]
    fn squared_loss_is_exact_on_constant_targets() {
        let rows = vec![vec![0.3], vec![-0.7], vec![0.4]];
        let targets = vec![10.0, 10.0, 10.0];

        let coef = fit_squared(&rows, &targets, &SolverConfig::default()).unwrap();
        for row in &rows {
            assert_approx_eq!(coef.linear_term(row), 10.0, 1e-6);
        }
    }

    #[test]
    fn poisson_recovers_a_constant_rate() {
        let rows = vec![vec![0.0], vec![0.0], vec![0.0], vec![0.0]];
        let targets = vec![8.0, 8.0, 8.0, 8.0];

        let coef = fit_poisson(&rows, &targets, &SolverConfig::default()).unwrap();
        assert_approx_eq!(coef.linear_term(&[0.0]).exp(), 8.0, 1e-6);
    }

    #[test]
    fn poisson_rejects_negative_targets() {
        let rows = vec![vec![0.0]];
        let targets = vec![-1.0];
        assert!(fit_poisson(&rows, &targets, &SolverConfig::default()).is_err());
    }

    #[test]
    fn identical_inputs_give_identical_coefficients() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![(i as f64) / 10.0 - 1.0]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| (r[0] * 1.5 + 2.0).max(0.0)).collect();

        let a = fit_squared(&rows, &targets, &config()).unwrap();
        let b = fit_squared(&rows, &targets, &config()).unwrap();
        assert_eq!(a, b);
    }
}
