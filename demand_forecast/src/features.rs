//! Feature construction: schemas, label encoding of categorical columns
//! and the lag/rolling window used by the recursive forecaster.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::data::SalesHistory;
use crate::error::{DemandError, Result};

/// Days of demand history required before a forecast origin; lag_28 and
/// rolling_mean_30 cannot be computed with less.
pub const MIN_HISTORY_DAYS: usize = 30;

/// Broad type of a feature, part of the schema fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Calendar,
    Numeric,
    Categorical,
    Lag,
}

impl FeatureKind {
    fn tag(&self) -> &'static str {
        match self {
            FeatureKind::Calendar => "calendar",
            FeatureKind::Numeric => "numeric",
            FeatureKind::Categorical => "categorical",
            FeatureKind::Lag => "lag",
        }
    }
}

/// One named, typed slot of a feature vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureField {
    pub name: String,
    pub kind: FeatureKind,
}

fn field(name: &str, kind: FeatureKind) -> FeatureField {
    FeatureField {
        name: name.to_string(),
        kind,
    }
}

/// Ordered list of feature fields. The fingerprint is the ordered
/// name:kind list itself, compared for exact equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    fields: Vec<FeatureField>,
}

impl FeatureSchema {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn fingerprint(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}:{}", f.name, f.kind.tag()))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Deterministic label encoding of one categorical column. Classes are
/// assigned indices in lexicographic order; unseen values map to -1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: BTreeMap<String, usize>,
}

impl LabelEncoder {
    pub fn fit<'a, I: IntoIterator<Item = &'a str>>(values: I) -> Self {
        let unique: BTreeSet<&str> = values.into_iter().collect();
        let classes = unique
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v.to_string(), i))
            .collect();
        Self { classes }
    }

    pub fn encode(&self, value: &str) -> f64 {
        self.classes
            .get(value)
            .map(|i| *i as f64)
            .unwrap_or(-1.0)
    }

    pub fn classes(&self) -> usize {
        self.classes.len()
    }
}

/// Label encoders for every categorical column used by the schemas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Encoders {
    pub store: LabelEncoder,
    pub sku: LabelEncoder,
    pub category: LabelEncoder,
    pub brand: LabelEncoder,
    pub channel: LabelEncoder,
}

impl Encoders {
    pub fn fit(history: &SalesHistory) -> Self {
        let records = history.records();
        Self {
            store: LabelEncoder::fit(records.iter().map(|r| r.store_id.as_str())),
            sku: LabelEncoder::fit(records.iter().map(|r| r.sku_id.as_str())),
            category: LabelEncoder::fit(records.iter().map(|r| r.category.as_str())),
            brand: LabelEncoder::fit(records.iter().map(|r| r.brand.as_str())),
            channel: LabelEncoder::fit(records.iter().map(|r| r.channel.as_str())),
        }
    }
}

/// Exogenous per-day context consumed by feature construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordContext {
    pub list_price: f64,
    pub discount_pct: f64,
    pub promo_flag: bool,
    pub temperature: f64,
    pub rain_mm: f64,
    pub is_holiday: bool,
    pub channel: String,
}

/// Borrowed identity of a store-SKU pair with its catalog attributes.
#[derive(Debug, Clone, Copy)]
pub struct EntityRef<'a> {
    pub store_id: &'a str,
    pub sku_id: &'a str,
    pub category: &'a str,
    pub brand: &'a str,
}

/// Trailing demand values consulted for lag and rolling features.
///
/// During recursive forecasting this is the request-local accumulator:
/// it starts from real history and grows by one predicted value per
/// forecast day, so day *t* only ever sees information from *t-1* and
/// earlier.
#[derive(Debug, Clone)]
pub struct DemandWindow {
    values: Vec<f64>,
}

impl DemandWindow {
    /// Start a window from a demand series, oldest first.
    pub fn from_history(values: &[f64]) -> Result<Self> {
        if values.len() < MIN_HISTORY_DAYS {
            return Err(DemandError::Validation(format!(
                "Demand window needs at least {MIN_HISTORY_DAYS} values, got {}",
                values.len()
            )));
        }
        Ok(Self {
            values: values.to_vec(),
        })
    }

    /// Append the next day's (predicted) demand.
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Demand observed `days_back` days before the next day.
    pub fn lag(&self, days_back: usize) -> f64 {
        self.values[self.values.len() - days_back]
    }

    /// Mean demand over the trailing `window` days.
    pub fn rolling_mean(&self, window: usize) -> f64 {
        let tail = &self.values[self.values.len() - window..];
        tail.iter().sum::<f64>() / window as f64
    }
}

fn weekday(date: NaiveDate) -> f64 {
    date.weekday().num_days_from_monday() as f64
}

fn is_weekend(date: NaiveDate) -> bool {
    date.weekday().num_days_from_monday() >= 5
}

/// Builds feature vectors for the three model schemas. Pure given its
/// encoders; owns no mutable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureBuilder {
    pub encoders: Encoders,
}

impl FeatureBuilder {
    pub fn fit(history: &SalesHistory) -> Self {
        Self {
            encoders: Encoders::fit(history),
        }
    }

    /// Schema of the recursive demand forecaster.
    pub fn demand_schema() -> FeatureSchema {
        FeatureSchema {
            fields: vec![
                field("month", FeatureKind::Calendar),
                field("weekday", FeatureKind::Calendar),
                field("day_of_month", FeatureKind::Calendar),
                field("is_weekend", FeatureKind::Calendar),
                field("is_holiday", FeatureKind::Calendar),
                field("promo_weekend", FeatureKind::Numeric),
                field("temperature", FeatureKind::Numeric),
                field("list_price", FeatureKind::Numeric),
                field("discount_pct", FeatureKind::Numeric),
                field("promo_flag", FeatureKind::Numeric),
                field("store_id", FeatureKind::Categorical),
                field("sku_id", FeatureKind::Categorical),
                field("category", FeatureKind::Categorical),
                field("brand", FeatureKind::Categorical),
                field("lag_1", FeatureKind::Lag),
                field("lag_7", FeatureKind::Lag),
                field("lag_14", FeatureKind::Lag),
                field("lag_28", FeatureKind::Lag),
                field("rolling_mean_7", FeatureKind::Lag),
                field("rolling_mean_30", FeatureKind::Lag),
            ],
        }
    }

    /// Lag-free schema used by the demand imputer. Its covariates must
    /// not depend on the demand series being corrected.
    pub fn context_schema() -> FeatureSchema {
        FeatureSchema {
            fields: vec![
                field("month", FeatureKind::Calendar),
                field("weekday", FeatureKind::Calendar),
                field("day_of_month", FeatureKind::Calendar),
                field("is_weekend", FeatureKind::Calendar),
                field("is_holiday", FeatureKind::Calendar),
                field("temperature", FeatureKind::Numeric),
                field("list_price", FeatureKind::Numeric),
                field("discount_pct", FeatureKind::Numeric),
                field("promo_flag", FeatureKind::Numeric),
                field("store_id", FeatureKind::Categorical),
                field("sku_id", FeatureKind::Categorical),
                field("category", FeatureKind::Categorical),
                field("brand", FeatureKind::Categorical),
            ],
        }
    }

    /// Schema of the supplier lead-time regressor.
    pub fn lead_time_schema() -> FeatureSchema {
        FeatureSchema {
            fields: vec![
                field("month", FeatureKind::Calendar),
                field("weekday", FeatureKind::Calendar),
                field("day_of_month", FeatureKind::Calendar),
                field("week_of_year", FeatureKind::Calendar),
                field("is_weekend", FeatureKind::Calendar),
                field("is_holiday", FeatureKind::Calendar),
                field("temperature", FeatureKind::Numeric),
                field("rain_mm", FeatureKind::Numeric),
                field("store_id", FeatureKind::Categorical),
                field("sku_id", FeatureKind::Categorical),
                field("category", FeatureKind::Categorical),
                field("brand", FeatureKind::Categorical),
                field("channel", FeatureKind::Categorical),
            ],
        }
    }

    /// Demand-schema vector for one day. Lag terms come from the window,
    /// which the recursive loop extends with its own predictions.
    pub fn build_demand(
        &self,
        date: NaiveDate,
        entity: EntityRef<'_>,
        ctx: &RecordContext,
        window: &DemandWindow,
    ) -> Vec<f64> {
        let weekend = is_weekend(date);
        vec![
            date.month() as f64,
            weekday(date),
            date.day() as f64,
            weekend as u8 as f64,
            ctx.is_holiday as u8 as f64,
            (ctx.promo_flag && weekend) as u8 as f64,
            ctx.temperature,
            ctx.list_price,
            ctx.discount_pct,
            ctx.promo_flag as u8 as f64,
            self.encoders.store.encode(entity.store_id),
            self.encoders.sku.encode(entity.sku_id),
            self.encoders.category.encode(entity.category),
            self.encoders.brand.encode(entity.brand),
            window.lag(1),
            window.lag(7),
            window.lag(14),
            window.lag(28),
            window.rolling_mean(7),
            window.rolling_mean(30),
        ]
    }

    /// Context-schema vector for one day.
    pub fn build_context(
        &self,
        date: NaiveDate,
        entity: EntityRef<'_>,
        ctx: &RecordContext,
    ) -> Vec<f64> {
        vec![
            date.month() as f64,
            weekday(date),
            date.day() as f64,
            is_weekend(date) as u8 as f64,
            ctx.is_holiday as u8 as f64,
            ctx.temperature,
            ctx.list_price,
            ctx.discount_pct,
            ctx.promo_flag as u8 as f64,
            self.encoders.store.encode(entity.store_id),
            self.encoders.sku.encode(entity.sku_id),
            self.encoders.category.encode(entity.category),
            self.encoders.brand.encode(entity.brand),
        ]
    }

    /// Lead-time-schema vector for one day.
    pub fn build_lead_time(
        &self,
        date: NaiveDate,
        entity: EntityRef<'_>,
        ctx: &RecordContext,
    ) -> Vec<f64> {
        vec![
            date.month() as f64,
            weekday(date),
            date.day() as f64,
            date.iso_week().week() as f64,
            is_weekend(date) as u8 as f64,
            ctx.is_holiday as u8 as f64,
            ctx.temperature,
            ctx.rain_mm,
            self.encoders.store.encode(entity.store_id),
            self.encoders.sku.encode(entity.sku_id),
            self.encoders.category.encode(entity.category),
            self.encoders.brand.encode(entity.brand),
            self.encoders.channel.encode(&ctx.channel),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_encoding_is_lexicographic_and_total() {
        let enc = LabelEncoder::fit(vec!["B", "A", "B", "C"]);
        assert_eq!(enc.classes(), 3);
        assert_eq!(enc.encode("A"), 0.0);
        assert_eq!(enc.encode("B"), 1.0);
        assert_eq!(enc.encode("C"), 2.0);
        assert_eq!(enc.encode("UNSEEN"), -1.0);
    }

    #[test]
    fn window_rejects_short_history() {
        let short = vec![1.0; MIN_HISTORY_DAYS - 1];
        assert!(DemandWindow::from_history(&short).is_err());
        assert!(DemandWindow::from_history(&vec![1.0; MIN_HISTORY_DAYS]).is_ok());
    }

    #[test]
    fn window_lags_track_appended_predictions() {
        let mut values: Vec<f64> = (1..=30).map(|v| v as f64).collect();
        let mut window = DemandWindow::from_history(&values).unwrap();
        assert_eq!(window.lag(1), 30.0);
        assert_eq!(window.lag(7), 24.0);

        window.push(99.0);
        values.push(99.0);
        assert_eq!(window.lag(1), 99.0);
        assert_eq!(window.lag(28), values[values.len() - 28]);
        assert_eq!(
            window.rolling_mean(7),
            values[values.len() - 7..].iter().sum::<f64>() / 7.0
        );
    }

    #[test]
    fn schema_lengths_match_built_vectors() {
        let builder = FeatureBuilder::default();
        let entity = EntityRef {
            store_id: "S1",
            sku_id: "K1",
            category: "C",
            brand: "B",
        };
        let ctx = RecordContext {
            list_price: 2.0,
            discount_pct: 0.1,
            promo_flag: true,
            temperature: 20.0,
            rain_mm: 1.5,
            is_holiday: false,
            channel: "RETAIL".to_string(),
        };
        let date: NaiveDate = "2024-03-16".parse().unwrap();
        let window = DemandWindow::from_history(&vec![5.0; 30]).unwrap();

        assert_eq!(
            builder.build_demand(date, entity, &ctx, &window).len(),
            FeatureBuilder::demand_schema().len()
        );
        assert_eq!(
            builder.build_context(date, entity, &ctx).len(),
            FeatureBuilder::context_schema().len()
        );
        assert_eq!(
            builder.build_lead_time(date, entity, &ctx).len(),
            FeatureBuilder::lead_time_schema().len()
        );
    }

    #[test]
    fn promo_weekend_requires_both() {
        let builder = FeatureBuilder::default();
        let entity = EntityRef {
            store_id: "S1",
            sku_id: "K1",
            category: "C",
            brand: "B",
        };
        let mut ctx = RecordContext {
            list_price: 2.0,
            discount_pct: 0.0,
            promo_flag: true,
            temperature: 20.0,
            rain_mm: 0.0,
            is_holiday: false,
            channel: "RETAIL".to_string(),
        };
        let window = DemandWindow::from_history(&vec![5.0; 30]).unwrap();

        // 2024-03-16 is a Saturday, 2024-03-18 a Monday.
        let saturday: NaiveDate = "2024-03-16".parse().unwrap();
        let monday: NaiveDate = "2024-03-18".parse().unwrap();

        let on = builder.build_demand(saturday, entity, &ctx, &window);
        assert_eq!(on[5], 1.0);

        let off_day = builder.build_demand(monday, entity, &ctx, &window);
        assert_eq!(off_day[5], 0.0);

        ctx.promo_flag = false;
        let off_promo = builder.build_demand(saturday, entity, &ctx, &window);
        assert_eq!(off_promo[5], 0.0);
    }

    #[test]
    fn fingerprint_is_stable_and_ordered() {
        let fp = FeatureBuilder::context_schema().fingerprint();
        assert!(fp.starts_with("month:calendar;weekday:calendar"));
        assert_eq!(fp, FeatureBuilder::context_schema().fingerprint());
        assert_ne!(fp, FeatureBuilder::demand_schema().fingerprint());
    }
}
