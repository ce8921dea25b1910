//! Supplier lead-time prediction.
//!
//! An independent regressor over calendar, weather and entity features.
//! Unlike demand it is not chained: each forecast day is recomputed with
//! that day's calendar features and never consumes the demand chain.

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::data::SalesHistory;
use crate::error::{DemandError, Result};
use crate::features::{EntityRef, FeatureBuilder, FeatureSchema, RecordContext};
use crate::models::{LinearRegression, TrainedLinearRegression};
use retail_math::regression::SolverConfig;

/// Rows with an observed lead time extracted from the corpus. `keep`
/// filters by date, for holdout splits.
pub(crate) fn lead_time_dataset(
    history: &SalesHistory,
    builder: &FeatureBuilder,
    keep: impl Fn(NaiveDate) -> bool,
) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rows = Vec::new();
    let mut targets = Vec::new();
    for record in history.records() {
        let Some(lead_time) = record.lead_time_days else {
            continue;
        };
        if !keep(record.date) {
            continue;
        }
        let entity = EntityRef {
            store_id: &record.store_id,
            sku_id: &record.sku_id,
            category: &record.category,
            brand: &record.brand,
        };
        rows.push(builder.build_lead_time(record.date, entity, &record.context()));
        targets.push(lead_time);
    }
    (rows, targets)
}

/// Untrained lead-time predictor specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadTimePredictor {
    pub solver: SolverConfig,
}

impl Default for LeadTimePredictor {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
        }
    }
}

impl LeadTimePredictor {
    /// Train on every historical row with an observed lead time.
    pub fn fit(
        &self,
        history: &SalesHistory,
        builder: &FeatureBuilder,
    ) -> Result<TrainedLeadTimeModel> {
        let (rows, targets) = lead_time_dataset(history, builder, |_| true);
        if rows.is_empty() {
            return Err(DemandError::Data(
                "No historical rows carry an observed lead time".to_string(),
            ));
        }

        let model = LinearRegression::new(self.solver.clone()).fit(&rows, &targets)?;
        info!("lead time: fitted on {} observations", rows.len());
        Ok(TrainedLeadTimeModel {
            model,
            schema: FeatureBuilder::lead_time_schema(),
        })
    }
}

/// Fitted lead-time model plus its training schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedLeadTimeModel {
    model: TrainedLinearRegression,
    schema: FeatureSchema,
}

impl TrainedLeadTimeModel {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn linear(&self) -> &TrainedLinearRegression {
        &self.model
    }

    /// Lead time in days for one forecast day, with the feature vector
    /// it was predicted from. Clamped at zero by the model.
    pub fn predict_day(
        &self,
        builder: &FeatureBuilder,
        date: NaiveDate,
        entity: EntityRef<'_>,
        ctx: &RecordContext,
    ) -> (f64, Vec<f64>) {
        let features = builder.build_lead_time(date, entity, ctx);
        let days = self.model.predict(&features);
        (days, features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HistoricalRecord;
    use chrono::Duration;

    fn history_with_lead_times(days: u32, lead: f64) -> SalesHistory {
        let origin = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records: Vec<HistoricalRecord> = (0..days)
            .map(|d| HistoricalRecord {
                date: origin + Duration::days(d as i64),
                store_id: "S1".to_string(),
                sku_id: "K1".to_string(),
                category: "FROZEN".to_string(),
                brand: "POLAR".to_string(),
                channel: "ONLINE".to_string(),
                units_sold: 6.0,
                stock_on_hand: 30.0,
                list_price: 7.5,
                discount_pct: 0.0,
                promo_flag: false,
                temperature: 10.0,
                rain_mm: 2.0,
                is_holiday: false,
                // Only even days have an observed lead time.
                lead_time_days: (d % 2 == 0).then_some(lead),
            })
            .collect();
        SalesHistory::from_records(records)
    }

    #[test]
    fn constant_lead_times_are_recovered() {
        let history = history_with_lead_times(40, 3.0);
        let builder = FeatureBuilder::fit(&history);
        let model = LeadTimePredictor::default().fit(&history, &builder).unwrap();

        let entity = EntityRef {
            store_id: "S1",
            sku_id: "K1",
            category: "FROZEN",
            brand: "POLAR",
        };
        let ctx = history.records()[0].context();
        let (days, features) = model.predict_day(
            &builder,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            entity,
            &ctx,
        );
        assert!((days - 3.0).abs() < 1.0, "expected ~3 days, got {days}");
        assert_eq!(features.len(), model.schema().len());
    }

    #[test]
    fn predictions_are_non_negative() {
        let history = history_with_lead_times(40, 0.5);
        let builder = FeatureBuilder::fit(&history);
        let model = LeadTimePredictor::default().fit(&history, &builder).unwrap();

        let entity = EntityRef {
            store_id: "S1",
            sku_id: "K1",
            category: "FROZEN",
            brand: "POLAR",
        };
        let ctx = history.records()[0].context();
        for offset in 0..30 {
            let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() + Duration::days(offset);
            let (days, _) = model.predict_day(&builder, date, entity, &ctx);
            assert!(days >= 0.0);
        }
    }

    #[test]
    fn training_requires_observations() {
        let mut records = history_with_lead_times(10, 3.0).records().to_vec();
        for r in records.iter_mut() {
            r.lead_time_days = None;
        }
        let history = SalesHistory::from_records(records);
        let builder = FeatureBuilder::fit(&history);
        assert!(LeadTimePredictor::default().fit(&history, &builder).is_err());
    }
}
