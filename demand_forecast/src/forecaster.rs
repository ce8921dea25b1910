//! Recursive 7-day demand forecasting.
//!
//! One regressor is trained at a fixed one-day horizon; a week-long
//! forecast applies it seven times, folding each day's prediction back
//! into the lag window consulted for the next day. The window is local
//! to a single request, so concurrent forecasts never see each other's
//! chains.

use chrono::{Duration, NaiveDate};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::data::SalesHistory;
use crate::error::{DemandError, Result};
use crate::features::{
    DemandWindow, EntityRef, FeatureBuilder, FeatureSchema, RecordContext, MIN_HISTORY_DAYS,
};
use crate::imputer::ImputedDemandRecord;
use crate::models::{LinearRegression, TrainedLinearRegression};
use retail_math::regression::SolverConfig;

/// Length of every forecast: seven consecutive days.
pub const FORECAST_DAYS: usize = 7;

/// One-step training rows extracted from the corpus.
pub(crate) struct OneStepDataset {
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

/// Build (features-at-day-t, demand-at-day-t) pairs for every corpus row
/// with at least [`MIN_HISTORY_DAYS`] of preceding series history. Lag
/// terms for day *t* are taken strictly from days before *t*. `keep`
/// filters rows by date, for holdout splits.
pub(crate) fn one_step_dataset(
    history: &SalesHistory,
    imputed: &[ImputedDemandRecord],
    builder: &FeatureBuilder,
    keep: impl Fn(NaiveDate) -> bool,
) -> OneStepDataset {
    let records = history.records();
    let mut rows = Vec::new();
    let mut targets = Vec::new();

    for range in history.series_ranges() {
        let demand: Vec<f64> = imputed[range.clone()].iter().map(|r| r.demand).collect();
        for i in MIN_HISTORY_DAYS..demand.len() {
            let record = &records[range.start + i];
            if !keep(record.date) {
                continue;
            }
            let window = DemandWindow::from_history(&demand[i - MIN_HISTORY_DAYS..i])
                .expect("window slice has exactly MIN_HISTORY_DAYS values");
            let entity = EntityRef {
                store_id: &record.store_id,
                sku_id: &record.sku_id,
                category: &record.category,
                brand: &record.brand,
            };
            rows.push(builder.build_demand(record.date, entity, &record.context(), &window));
            targets.push(demand[i]);
        }
    }

    OneStepDataset { rows, targets }
}

/// Untrained forecaster specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandForecaster {
    pub solver: SolverConfig,
}

impl Default for DemandForecaster {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
        }
    }
}

impl DemandForecaster {
    /// Train the one-step-ahead regressor on imputed demand targets.
    ///
    /// `imputed` must be aligned row-for-row with `history.records()`,
    /// as produced by [`crate::imputer::ImputerModel::impute`].
    pub fn fit(
        &self,
        history: &SalesHistory,
        imputed: &[ImputedDemandRecord],
        builder: &FeatureBuilder,
    ) -> Result<TrainedDemandModel> {
        if imputed.len() != history.len() {
            return Err(DemandError::Validation(format!(
                "Imputed rows ({}) do not align with history rows ({})",
                imputed.len(),
                history.len()
            )));
        }

        let dataset = one_step_dataset(history, imputed, builder, |_| true);
        if dataset.rows.is_empty() {
            return Err(DemandError::Data(format!(
                "No store-SKU series has more than {MIN_HISTORY_DAYS} days of history to train on"
            )));
        }

        let model = LinearRegression::log1p(self.solver.clone()).fit(&dataset.rows, &dataset.targets)?;
        info!(
            "forecaster: fitted one-step model on {} rows",
            dataset.rows.len()
        );
        Ok(TrainedDemandModel {
            model,
            schema: FeatureBuilder::demand_schema(),
        })
    }
}

/// One forecast day before lead-time and attribution enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyDemand {
    pub date: NaiveDate,
    pub units: f64,
    /// The exact feature vector the prediction was made from
    pub features: Vec<f64>,
}

/// Fitted one-step demand model plus the schema it was trained against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedDemandModel {
    model: TrainedLinearRegression,
    schema: FeatureSchema,
}

impl TrainedDemandModel {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn linear(&self) -> &TrainedLinearRegression {
        &self.model
    }

    /// Predict the next seven days for one store-SKU pair.
    ///
    /// `demand_history` is the corrected demand series up to the
    /// forecast origin, oldest first. Lags that reach before the origin
    /// come from it; lags that land inside the forecast week come from
    /// this request's own accumulated predictions.
    pub fn forecast_week(
        &self,
        builder: &FeatureBuilder,
        entity: EntityRef<'_>,
        ctx: &RecordContext,
        demand_history: &[f64],
        start_date: NaiveDate,
    ) -> Result<Vec<DailyDemand>> {
        if demand_history.len() < MIN_HISTORY_DAYS {
            return Err(DemandError::InsufficientHistory {
                store_id: entity.store_id.to_string(),
                sku_id: entity.sku_id.to_string(),
                available: demand_history.len(),
                required: MIN_HISTORY_DAYS,
            });
        }

        let mut window = DemandWindow::from_history(demand_history)?;
        let mut days = Vec::with_capacity(FORECAST_DAYS);
        for offset in 0..FORECAST_DAYS {
            let date = start_date + Duration::days(offset as i64);
            let features = builder.build_demand(date, entity, ctx, &window);
            let units = self.model.predict(&features);
            debug!(
                "forecast day {} {}: {:.2} units",
                offset + 1,
                date,
                units
            );
            window.push(units);
            days.push(DailyDemand {
                date,
                units,
                features,
            });
        }
        Ok(days)
    }
}
