//! Error types for the demand_forecast crate

use thiserror::Error;

use crate::pipeline::TrainingStage;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum DemandError {
    /// Fewer than the required days of history precede the requested
    /// forecast origin for this store-SKU pair
    #[error(
        "Insufficient history for store {store_id} sku {sku_id}: {available} days available, {required} required"
    )]
    InsufficientHistory {
        store_id: String,
        sku_id: String,
        available: usize,
        required: usize,
    },

    /// The requested store/SKU pair never appeared in training history
    #[error("Unknown entity: store {store_id} sku {sku_id} not present in training history")]
    UnknownEntity { store_id: String, sku_id: String },

    /// A predict call arrived before any successful training run
    #[error("Models are not trained yet; run training before requesting forecasts")]
    ModelNotTrained,

    /// A training stage failed; no artifacts were replaced
    #[error("Training stage {stage} failed: {cause}")]
    Training {
        stage: TrainingStage,
        #[source]
        cause: Box<DemandError>,
    },

    /// A stored artifact failed integrity or schema-fingerprint checks
    #[error("Artifact corruption: {0}")]
    ArtifactCorruption(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    Data(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error from mathematical operations
    #[error("Math error: {0}")]
    Math(#[from] retail_math::MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, DemandError>;
