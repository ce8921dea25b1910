//! Accuracy metrics for demand and lead-time forecasts

use crate::{MathError, Result};

fn validate_pair(forecast: &[f64], actual: &[f64]) -> Result<()> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(MathError::InvalidInput(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }
    Ok(())
}

/// Mean Absolute Error
pub fn mae(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    validate_pair(forecast, actual)?;

    let sum: f64 = forecast
        .iter()
        .zip(actual.iter())
        .map(|(f, a)| (f - a).abs())
        .sum();

    Ok(sum / forecast.len() as f64)
}

/// Root Mean Squared Error
pub fn rmse(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    validate_pair(forecast, actual)?;

    let sum: f64 = forecast
        .iter()
        .zip(actual.iter())
        .map(|(f, a)| (f - a).powi(2))
        .sum();

    Ok((sum / forecast.len() as f64).sqrt())
}

/// Weighted Mean Absolute Percentage Error.
///
/// Total absolute error divided by total absolute actual volume. Returns
/// 0.0 when the actual volume sums to zero, so sparse series do not blow
/// up the metric.
pub fn wmape(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    validate_pair(forecast, actual)?;

    let sum_abs_diff: f64 = forecast
        .iter()
        .zip(actual.iter())
        .map(|(f, a)| (f - a).abs())
        .sum();
    let sum_abs_actual: f64 = actual.iter().map(|a| a.abs()).sum();

    if sum_abs_actual > 0.0 {
        Ok(sum_abs_diff / sum_abs_actual)
    } else {
        Ok(0.0)
    }
}

/// Mean Absolute Percentage Error with zero-valued actuals masked out.
///
/// Rows where the actual value is zero carry no percentage information
/// and are excluded; an all-zero actual series yields 0.0.
pub fn mape(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    validate_pair(forecast, actual)?;

    let mut sum = 0.0;
    let mut count = 0usize;
    for (f, a) in forecast.iter().zip(actual.iter()) {
        if *a != 0.0 {
            sum += ((a - f) / a).abs();
            count += 1;
        }
    }

    if count == 0 {
        return Ok(0.0);
    }
    Ok(sum / count as f64)
}
