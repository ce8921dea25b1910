//! Summary statistics used for feature standardization

use crate::{MathError, Result};

/// Arithmetic mean of a slice
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot compute the mean of an empty slice".to_string(),
        ));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation of a slice
pub fn std_dev(values: &[f64]) -> Result<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Ok(variance.sqrt())
}

/// Per-column mean and standard deviation of a row-major design matrix.
///
/// Columns with zero spread get a standard deviation of 1.0 so that
/// standardizing maps them to 0 instead of dividing by zero.
pub fn column_moments(rows: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<f64>)> {
    let first = rows.first().ok_or_else(|| {
        MathError::InsufficientData("Cannot compute moments of an empty matrix".to_string())
    })?;
    let width = first.len();
    let n = rows.len() as f64;

    let mut means = vec![0.0; width];
    for row in rows {
        if row.len() != width {
            return Err(MathError::InvalidInput(
                "All matrix rows must have the same width".to_string(),
            ));
        }
        for (acc, v) in means.iter_mut().zip(row.iter()) {
            *acc += v;
        }
    }
    for m in means.iter_mut() {
        *m /= n;
    }

    let mut stds = vec![0.0; width];
    for row in rows {
        for ((acc, v), m) in stds.iter_mut().zip(row.iter()).zip(means.iter()) {
            *acc += (v - m).powi(2);
        }
    }
    for s in stds.iter_mut() {
        *s = (*s / n).sqrt();
        if *s < 1e-12 {
            *s = 1.0;
        }
    }

    Ok((means, stds))
}
