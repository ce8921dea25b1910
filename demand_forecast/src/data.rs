//! Historical sales data handling: records, the indexed corpus, CSV
//! ingestion and the persisted history snapshot.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{DemandError, Result};
use crate::explain::Attribution;
use crate::features::RecordContext;

/// One observed row of the append-only sales corpus, keyed by
/// (date, store_id, sku_id). Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub date: NaiveDate,
    pub store_id: String,
    pub sku_id: String,
    pub category: String,
    pub brand: String,
    pub channel: String,
    pub units_sold: f64,
    pub stock_on_hand: f64,
    pub list_price: f64,
    pub discount_pct: f64,
    pub promo_flag: bool,
    pub temperature: f64,
    pub rain_mm: f64,
    pub is_holiday: bool,
    /// Observed supplier lead time for orders placed that day, when known
    pub lead_time_days: Option<f64>,
}

impl HistoricalRecord {
    /// A stockout day: recorded sales understate true demand.
    pub fn is_stockout(&self) -> bool {
        self.stock_on_hand <= 0.0
    }

    /// Exogenous context carried into feature construction.
    pub fn context(&self) -> RecordContext {
        RecordContext {
            list_price: self.list_price,
            discount_pct: self.discount_pct,
            promo_flag: self.promo_flag,
            temperature: self.temperature,
            rain_mm: self.rain_mm,
            is_holiday: self.is_holiday,
            channel: self.channel.clone(),
        }
    }
}

/// Raw CSV row. Flag columns arrive as 0/1 integers; an empty
/// lead_time_days cell means no observation for that day.
#[derive(Debug, Deserialize)]
struct RawRecord {
    date: NaiveDate,
    store_id: String,
    sku_id: String,
    category: String,
    brand: String,
    channel: String,
    units_sold: f64,
    stock_on_hand: f64,
    list_price: f64,
    discount_pct: f64,
    promo_flag: u8,
    temperature: f64,
    rain_mm: f64,
    is_holiday: u8,
    lead_time_days: Option<f64>,
}

impl From<RawRecord> for HistoricalRecord {
    fn from(raw: RawRecord) -> Self {
        Self {
            date: raw.date,
            store_id: raw.store_id,
            sku_id: raw.sku_id,
            category: raw.category,
            brand: raw.brand,
            channel: raw.channel,
            units_sold: raw.units_sold,
            stock_on_hand: raw.stock_on_hand,
            list_price: raw.list_price,
            discount_pct: raw.discount_pct,
            promo_flag: raw.promo_flag != 0,
            temperature: raw.temperature,
            rain_mm: raw.rain_mm,
            is_holiday: raw.is_holiday != 0,
            lead_time_days: raw.lead_time_days,
        }
    }
}

/// The training corpus: records sorted by (store, SKU, date) with an
/// index from each store-SKU pair to its contiguous run of rows.
#[derive(Debug, Clone)]
pub struct SalesHistory {
    records: Vec<HistoricalRecord>,
    index: HashMap<(String, String), Range<usize>>,
}

impl SalesHistory {
    /// Build a sorted, indexed corpus from unordered records.
    pub fn from_records(mut records: Vec<HistoricalRecord>) -> Self {
        records.sort_by(|a, b| {
            (&a.store_id, &a.sku_id, a.date).cmp(&(&b.store_id, &b.sku_id, b.date))
        });

        let mut index = HashMap::new();
        let mut start = 0usize;
        for i in 1..=records.len() {
            let boundary = i == records.len()
                || records[i].store_id != records[start].store_id
                || records[i].sku_id != records[start].sku_id;
            if boundary {
                index.insert(
                    (records[start].store_id.clone(), records[start].sku_id.clone()),
                    start..i,
                );
                start = i;
            }
        }

        Self { records, index }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in (store, SKU, date) order.
    pub fn records(&self) -> &[HistoricalRecord] {
        &self.records
    }

    /// Contiguous index ranges per store-SKU pair, in record order.
    pub fn series_ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        // Walk the records rather than the map so iteration order is
        // deterministic.
        SeriesRangeIter {
            records: &self.records,
            pos: 0,
        }
    }

    /// The date-ordered series for one store-SKU pair.
    pub fn series(&self, store_id: &str, sku_id: &str) -> Option<&[HistoricalRecord]> {
        self.index
            .get(&(store_id.to_string(), sku_id.to_string()))
            .map(|range| &self.records[range.clone()])
    }

    pub fn contains(&self, store_id: &str, sku_id: &str) -> bool {
        self.index
            .contains_key(&(store_id.to_string(), sku_id.to_string()))
    }

    pub fn max_date(&self) -> Option<NaiveDate> {
        self.records.iter().map(|r| r.date).max()
    }

    /// Corpus restricted to rows strictly before the cutoff date.
    pub fn before(&self, cutoff: NaiveDate) -> SalesHistory {
        SalesHistory::from_records(
            self.records
                .iter()
                .filter(|r| r.date < cutoff)
                .cloned()
                .collect(),
        )
    }
}

struct SeriesRangeIter<'a> {
    records: &'a [HistoricalRecord],
    pos: usize,
}

impl Iterator for SeriesRangeIter<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        if self.pos >= self.records.len() {
            return None;
        }
        let start = self.pos;
        let head = &self.records[start];
        let mut end = start + 1;
        while end < self.records.len()
            && self.records[end].store_id == head.store_id
            && self.records[end].sku_id == head.sku_id
        {
            end += 1;
        }
        self.pos = end;
        Some(start..end)
    }
}

/// Loader for historical sales data
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load the corpus from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<SalesHistory> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let mut records = Vec::new();
        for row in reader.deserialize::<RawRecord>() {
            records.push(HistoricalRecord::from(row?));
        }
        if records.is_empty() {
            return Err(DemandError::Data(format!(
                "No rows found in {}",
                path.as_ref().display()
            )));
        }
        info!(
            "loaded {} historical rows from {}",
            records.len(),
            path.as_ref().display()
        );
        Ok(SalesHistory::from_records(records))
    }
}

/// Trailing slice of one store-SKU demand series, retained so lag
/// features can be served for dates shortly after the training cutoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesTail {
    pub store_id: String,
    pub sku_id: String,
    pub last_date: NaiveDate,
    /// Corrected (imputed) demand values, oldest first
    pub demand: Vec<f64>,
    /// Context of the most recent row, reused for future days
    pub context: RecordContext,
}

/// Per-pair trailing demand history persisted alongside the model
/// artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub series: Vec<SeriesTail>,
}

impl HistorySnapshot {
    /// Build the snapshot from the corpus and its aligned imputed demand
    /// values, keeping at most `keep_days` trailing values per pair.
    ///
    /// Future forecast days have no holiday calendar, so the retained
    /// context always carries `is_holiday = false`.
    pub fn build(history: &SalesHistory, demand: &[f64], keep_days: usize) -> Self {
        let records = history.records();
        let mut series = Vec::new();
        for range in history.series_ranges() {
            let last = &records[range.end - 1];
            let tail_start = range.start.max(range.end.saturating_sub(keep_days));
            let mut context = last.context();
            context.is_holiday = false;
            series.push(SeriesTail {
                store_id: last.store_id.clone(),
                sku_id: last.sku_id.clone(),
                last_date: last.date,
                demand: demand[tail_start..range.end].to_vec(),
                context,
            });
        }
        Self { series }
    }

    pub fn find(&self, store_id: &str, sku_id: &str) -> Option<&SeriesTail> {
        self.series
            .iter()
            .find(|t| t.store_id == store_id && t.sku_id == sku_id)
    }
}

/// A 7-day forecast request; also the exact cache fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub start_date: NaiveDate,
    pub store_id: String,
    pub sku_id: String,
    pub category: String,
    pub brand: String,
}

/// Outcome marker carried by a completed forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Complete,
}

/// One forecast day: demand, supply lead time and their attributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub units_sold: f64,
    pub lead_time_days: f64,
    pub demand_attribution: Attribution,
    pub lead_time_attribution: Attribution,
}

/// A completed 7-day forecast. Immutable once produced; cached by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub request: PredictionRequest,
    pub days: Vec<DailyForecast>,
    pub status: ForecastStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(store: &str, sku: &str, date: &str, units: f64) -> HistoricalRecord {
        HistoricalRecord {
            date: date.parse().unwrap(),
            store_id: store.to_string(),
            sku_id: sku.to_string(),
            category: "BEVERAGES".to_string(),
            brand: "ACME".to_string(),
            channel: "RETAIL".to_string(),
            units_sold: units,
            stock_on_hand: 50.0,
            list_price: 3.5,
            discount_pct: 0.0,
            promo_flag: false,
            temperature: 18.0,
            rain_mm: 0.0,
            is_holiday: false,
            lead_time_days: Some(2.0),
        }
    }

    #[test]
    fn history_sorts_and_indexes_series() {
        let history = SalesHistory::from_records(vec![
            record("S2", "K1", "2024-01-02", 4.0),
            record("S1", "K1", "2024-01-02", 2.0),
            record("S1", "K1", "2024-01-01", 1.0),
            record("S2", "K1", "2024-01-01", 3.0),
        ]);

        let series = history.series("S1", "K1").unwrap();
        assert_eq!(series.len(), 2);
        assert!(series[0].date < series[1].date);
        assert!(history.contains("S2", "K1"));
        assert!(!history.contains("S3", "K1"));
        assert_eq!(history.series_ranges().count(), 2);
    }

    #[test]
    fn before_keeps_only_older_rows() {
        let history = SalesHistory::from_records(vec![
            record("S1", "K1", "2024-01-01", 1.0),
            record("S1", "K1", "2024-01-02", 2.0),
            record("S1", "K1", "2024-01-03", 3.0),
        ]);

        let older = history.before("2024-01-03".parse().unwrap());
        assert_eq!(older.len(), 2);
        assert_eq!(older.max_date(), Some("2024-01-02".parse().unwrap()));
    }

    #[test]
    fn snapshot_keeps_trailing_demand_and_clears_holiday() {
        let mut records = Vec::new();
        for day in 1..=9 {
            let mut r = record("S1", "K1", &format!("2024-01-0{day}"), day as f64);
            r.is_holiday = true;
            records.push(r);
        }
        let history = SalesHistory::from_records(records);
        let demand: Vec<f64> = (1..=9).map(|d| d as f64).collect();

        let snapshot = HistorySnapshot::build(&history, &demand, 5);
        let tail = snapshot.find("S1", "K1").unwrap();
        assert_eq!(tail.demand, vec![5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(tail.last_date, "2024-01-09".parse().unwrap());
        assert!(!tail.context.is_holiday);
        assert!(snapshot.find("S1", "K9").is_none());
    }
}
