//! Holdout evaluation run during training.
//!
//! The corpus is split at `max_date - holdout_days`; throwaway models
//! are fitted on the older side and scored one-step-ahead on the newer
//! side, on the real demand scale. Scores ride on the training report;
//! a degenerate split simply yields no scores.

use chrono::Duration;
use log::info;
use serde::{Deserialize, Serialize};

use crate::data::SalesHistory;
use crate::error::Result;
use crate::features::FeatureBuilder;
use crate::forecaster::{one_step_dataset, DemandForecaster};
use crate::imputer::DemandImputer;
use crate::lead_time::{lead_time_dataset, LeadTimePredictor};
use crate::models::LinearRegression;
use retail_math::metrics::{mae, mape, rmse, wmape};

/// Demand accuracy on the holdout window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastScores {
    pub rmse: f64,
    pub mae: f64,
    pub wmape: f64,
    pub mape: f64,
}

/// Lead-time accuracy on the holdout window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeadTimeScores {
    pub rmse: f64,
    pub mae: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub demand: Option<ForecastScores>,
    pub lead_time: Option<LeadTimeScores>,
}

/// Run the holdout evaluation. Returns empty metrics when the corpus is
/// too short to split.
pub fn evaluate(
    history: &SalesHistory,
    imputer: &DemandImputer,
    forecaster: &DemandForecaster,
    lead_time: &LeadTimePredictor,
    holdout_days: u32,
) -> Result<EvaluationMetrics> {
    let mut metrics = EvaluationMetrics {
        demand: None,
        lead_time: None,
    };
    let Some(max_date) = history.max_date() else {
        return Ok(metrics);
    };
    let cutoff = max_date - Duration::days(holdout_days as i64);

    let train_history = history.before(cutoff);
    if train_history.is_empty() {
        return Ok(metrics);
    }

    // Encoders come from the training side only; holdout entities the
    // training side never saw encode as unknown, as they would live.
    let builder = FeatureBuilder::fit(&train_history);

    let imputer_model = imputer.fit(&train_history, &builder)?;
    let imputed = imputer_model.impute(history, &builder);

    let train_set = one_step_dataset(history, &imputed, &builder, |d| d < cutoff);
    let test_set = one_step_dataset(history, &imputed, &builder, |d| d >= cutoff);
    if !train_set.rows.is_empty() && !test_set.rows.is_empty() {
        let model = LinearRegression::log1p(forecaster.solver.clone())
            .fit(&train_set.rows, &train_set.targets)?;
        let predicted: Vec<f64> = test_set.rows.iter().map(|r| model.predict(r)).collect();
        let scores = ForecastScores {
            rmse: rmse(&predicted, &test_set.targets)?,
            mae: mae(&predicted, &test_set.targets)?,
            wmape: wmape(&predicted, &test_set.targets)?,
            mape: mape(&predicted, &test_set.targets)?,
        };
        info!(
            "evaluation: demand holdout rmse={:.2} mae={:.2} wmape={:.2}% rows={}",
            scores.rmse,
            scores.mae,
            scores.wmape * 100.0,
            test_set.rows.len()
        );
        metrics.demand = Some(scores);
    }

    let (lead_train_rows, lead_train_targets) = lead_time_dataset(history, &builder, |d| d < cutoff);
    let (lead_test_rows, lead_test_targets) = lead_time_dataset(history, &builder, |d| d >= cutoff);
    if !lead_train_rows.is_empty() && !lead_test_rows.is_empty() {
        let model = LinearRegression::new(lead_time.solver.clone())
            .fit(&lead_train_rows, &lead_train_targets)?;
        let predicted: Vec<f64> = lead_test_rows.iter().map(|r| model.predict(r)).collect();
        let scores = LeadTimeScores {
            rmse: rmse(&predicted, &lead_test_targets)?,
            mae: mae(&predicted, &lead_test_targets)?,
        };
        info!(
            "evaluation: lead-time holdout rmse={:.2} mae={:.2} rows={}",
            scores.rmse,
            scores.mae,
            lead_test_rows.len()
        );
        metrics.lead_time = Some(scores);
    }

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HistoricalRecord;
    use chrono::NaiveDate;

    fn history(days: u32) -> SalesHistory {
        let origin = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records: Vec<HistoricalRecord> = (0..days)
            .map(|d| HistoricalRecord {
                date: origin + Duration::days(d as i64),
                store_id: "S1".to_string(),
                sku_id: "K1".to_string(),
                category: "BAKERY".to_string(),
                brand: "OVEN".to_string(),
                channel: "RETAIL".to_string(),
                units_sold: 10.0,
                stock_on_hand: 80.0,
                list_price: 2.5,
                discount_pct: 0.0,
                promo_flag: false,
                temperature: 16.0,
                rain_mm: 0.0,
                is_holiday: false,
                lead_time_days: Some(4.0),
            })
            .collect();
        SalesHistory::from_records(records)
    }

    #[test]
    fn long_flat_history_scores_well_on_both_models() {
        let metrics = evaluate(
            &history(90),
            &DemandImputer::default(),
            &DemandForecaster::default(),
            &LeadTimePredictor::default(),
            28,
        )
        .unwrap();

        let demand = metrics.demand.expect("demand scores");
        assert!(demand.rmse < 1.5, "rmse {}", demand.rmse);
        assert!(demand.mae < 1.5);

        let lead = metrics.lead_time.expect("lead-time scores");
        assert!(lead.mae < 1.0);
    }

    #[test]
    fn short_history_yields_no_scores() {
        let metrics = evaluate(
            &history(10),
            &DemandImputer::default(),
            &DemandForecaster::default(),
            &LeadTimePredictor::default(),
            28,
        )
        .unwrap();

        assert!(metrics.demand.is_none());
        assert!(metrics.lead_time.is_none());
    }
}
