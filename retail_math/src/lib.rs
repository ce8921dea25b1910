//! # Retail Math
//!
//! Mathematical building blocks for retail demand forecasting.
//! This crate provides forecast-accuracy metrics, summary statistics and
//! deterministic gradient-descent solvers for regression models.

use thiserror::Error;

pub mod metrics;
pub mod regression;
pub mod stats;

/// Errors that can occur in forecasting-related calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for retail math operations
pub type Result<T> = std::result::Result<T, MathError>;

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        assert_eq!(2 + 2, 4);
    }
}
