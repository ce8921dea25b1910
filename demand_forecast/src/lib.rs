//! # Demand Forecast
//!
//! A Rust library for retail demand and supplier lead-time forecasting
//! from historical, partially-censored sales data.
//!
//! ## Features
//!
//! - Recovery of true demand from stockout-censored sales records
//! - Recursive 7-day forecasting from a single one-step-ahead regressor
//! - Independent supplier lead-time regression
//! - Additive per-prediction feature attributions for both models
//! - Atomic artifact persistence with hot-swapped model generations
//! - A bounded LRU prediction cache with single-flight computation
//!
//! ## Quick Start
//!
//! ```no_run
//! use demand_forecast::data::PredictionRequest;
//! use demand_forecast::pipeline::{ForecastService, PipelineConfig};
//!
//! fn main() -> demand_forecast::Result<()> {
//!     // Load persisted models if a trained generation exists.
//!     let service = ForecastService::open(PipelineConfig::default())?;
//!
//!     // (Re)train from a historical sales CSV.
//!     let report = service.train(std::path::Path::new("data/processed.csv"))?;
//!     println!("trained on {} rows", report.rows_used);
//!
//!     // Forecast the next 7 days for one store-SKU pair.
//!     let request = PredictionRequest {
//!         start_date: "2024-06-01".parse().unwrap(),
//!         store_id: "STORE0001".to_string(),
//!         sku_id: "SKU0001".to_string(),
//!         category: "BEVERAGES".to_string(),
//!         brand: "ACME".to_string(),
//!     };
//!     let forecast = service.predict(&request)?;
//!     for day in &forecast.days {
//!         println!("{}: {:.1} units, lead {:.1} days", day.date, day.units_sold, day.lead_time_days);
//!     }
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod cache;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod explain;
pub mod features;
pub mod forecaster;
pub mod imputer;
pub mod lead_time;
pub mod models;
pub mod pipeline;
pub mod workers;

// Re-export commonly used types
pub use crate::cache::{CacheStats, PredictionCache};
pub use crate::data::{
    DataLoader, HistoricalRecord, PredictionRequest, PredictionResult, SalesHistory,
};
pub use crate::error::{DemandError, Result};
pub use crate::forecaster::FORECAST_DAYS;
pub use crate::pipeline::{
    ForecastService, PipelineConfig, ServiceState, ServiceStatus, TrainingReport,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
