//! Per-prediction feature attributions.
//!
//! Contributions are computed in the model's link space (weight times
//! standardized deviation from the training mean) and rescaled to the
//! response scale so they sum exactly to `prediction - baseline`,
//! the local-accuracy property. The baseline is the model's prediction
//! at the training feature means.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::features::FeatureSchema;
use crate::models::TrainedLinearRegression;

/// Additive decomposition of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Model output at the training feature means
    pub baseline: f64,
    /// Per-feature contributions; `baseline + Σ contributions` equals
    /// the prediction
    pub contributions: BTreeMap<String, f64>,
}

/// Attribute one prediction of a fitted linear model.
pub fn explain_linear(
    model: &TrainedLinearRegression,
    schema: &FeatureSchema,
    row: &[f64],
) -> Attribution {
    let prediction = model.predict(row);
    let baseline = model.baseline();
    let link_contributions = model.link_contributions(row);
    let link_sum: f64 = link_contributions.iter().sum();

    // When the link deviation is zero the prediction already equals the
    // baseline and every contribution is zero.
    let scale = if link_sum.abs() > 1e-12 {
        (prediction - baseline) / link_sum
    } else {
        0.0
    };

    let contributions = schema
        .names()
        .zip(link_contributions.iter())
        .map(|(name, c)| (name.to_string(), c * scale))
        .collect();

    Attribution {
        baseline,
        contributions,
    }
}
