//! Censored demand recovery.
//!
//! Recorded unit sales understate true demand on stockout days. The
//! imputer fits a Poisson-family count regression on days without a
//! stockout and replaces each stockout day's target with the model's
//! expected demand, never below what was actually observed.

use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::data::SalesHistory;
use crate::error::Result;
use crate::features::{EntityRef, FeatureBuilder, FeatureSchema};
use crate::models::{PoissonRegression, TrainedPoissonRegression};

/// Corrected demand for one historical row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputedDemandRecord {
    pub date: NaiveDate,
    pub store_id: String,
    pub sku_id: String,
    /// Units actually sold
    pub observed: f64,
    /// Regression target after correction; never below `observed`
    pub demand: f64,
    /// Whether the model raised this row above its observed value
    pub imputed: bool,
}

/// Untrained imputer specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandImputer {
    /// Fewer non-stockout rows than this and the imputer falls back to
    /// raw observed counts
    pub min_training_rows: usize,
    pub regression: PoissonRegression,
}

impl Default for DemandImputer {
    fn default() -> Self {
        Self {
            min_training_rows: 30,
            regression: PoissonRegression::default(),
        }
    }
}

impl DemandImputer {
    /// Fit the count model on non-stockout rows.
    pub fn fit(&self, history: &SalesHistory, builder: &FeatureBuilder) -> Result<ImputerModel> {
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for record in history.records() {
            if record.is_stockout() {
                continue;
            }
            let entity = EntityRef {
                store_id: &record.store_id,
                sku_id: &record.sku_id,
                category: &record.category,
                brand: &record.brand,
            };
            rows.push(builder.build_context(record.date, entity, &record.context()));
            targets.push(record.units_sold);
        }

        if rows.len() < self.min_training_rows {
            warn!(
                "imputer: only {} uncensored rows (need {}), falling back to raw observed counts",
                rows.len(),
                self.min_training_rows
            );
            return Ok(ImputerModel {
                model: None,
                schema: FeatureBuilder::context_schema(),
            });
        }

        let model = self.regression.fit(&rows, &targets)?;
        info!("imputer: fitted on {} uncensored rows", rows.len());
        Ok(ImputerModel {
            model: Some(model),
            schema: FeatureBuilder::context_schema(),
        })
    }
}

/// Fitted imputer; `None` inside means the raw-counts fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputerModel {
    model: Option<TrainedPoissonRegression>,
    schema: FeatureSchema,
}

impl ImputerModel {
    pub fn is_fallback(&self) -> bool {
        self.model.is_none()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Corrected demand for every row of the corpus, in corpus order.
    pub fn impute(
        &self,
        history: &SalesHistory,
        builder: &FeatureBuilder,
    ) -> Vec<ImputedDemandRecord> {
        let mut corrected = 0usize;
        let out: Vec<ImputedDemandRecord> = history
            .records()
            .iter()
            .map(|record| {
                let mut demand = record.units_sold;
                let mut imputed = false;
                if record.is_stockout() {
                    if let Some(model) = &self.model {
                        let entity = EntityRef {
                            store_id: &record.store_id,
                            sku_id: &record.sku_id,
                            category: &record.category,
                            brand: &record.brand,
                        };
                        let estimate = model.predict(&builder.build_context(
                            record.date,
                            entity,
                            &record.context(),
                        ));
                        if estimate > record.units_sold {
                            demand = estimate;
                            imputed = true;
                            corrected += 1;
                        }
                    }
                }
                ImputedDemandRecord {
                    date: record.date,
                    store_id: record.store_id.clone(),
                    sku_id: record.sku_id.clone(),
                    observed: record.units_sold,
                    demand,
                    imputed,
                }
            })
            .collect();
        info!(
            "imputer: corrected {} of {} rows",
            corrected,
            history.len()
        );
        out
    }
}
