//! Training orchestration and the serving front door.
//!
//! [`ForecastService`] owns the single active model generation, the
//! prediction cache and the inference worker pool. Training builds an
//! entire replacement generation off to the side and swaps it in with
//! one reference-store; in-flight predictions keep the generation they
//! cloned at entry, so a half-trained state is never observable.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactKind, ArtifactStore, TrainingMetadata};
use crate::cache::{CacheLookup, CacheStats, PredictionCache};
use crate::data::{
    DailyForecast, DataLoader, ForecastStatus, HistorySnapshot, PredictionRequest,
    PredictionResult, SalesHistory,
};
use crate::error::{DemandError, Result};
use crate::evaluation::{evaluate, EvaluationMetrics};
use crate::explain::explain_linear;
use crate::features::{EntityRef, FeatureBuilder};
use crate::forecaster::{DemandForecaster, TrainedDemandModel};
use crate::imputer::{DemandImputer, ImputerModel};
use crate::lead_time::{LeadTimePredictor, TrainedLeadTimeModel};
use crate::workers::WorkerPool;

/// Stages of the training pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStage {
    Ingest,
    Imputer,
    Forecaster,
    LeadTime,
    Evaluation,
    Persist,
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingStage::Ingest => "ingest",
            TrainingStage::Imputer => "imputer",
            TrainingStage::Forecaster => "forecaster",
            TrainingStage::LeadTime => "lead_time",
            TrainingStage::Evaluation => "evaluation",
            TrainingStage::Persist => "persist",
        };
        f.write_str(name)
    }
}

fn stage_failure(stage: TrainingStage) -> impl FnOnce(DemandError) -> DemandError {
    move |cause| DemandError::Training {
        stage,
        cause: Box::new(cause),
    }
}

/// Service configuration; every field has a serving-ready default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory the artifact generation is persisted under
    pub artifact_dir: PathBuf,
    pub cache_capacity: usize,
    pub worker_threads: usize,
    /// Trailing demand values retained per store-SKU pair for lag
    /// service after the training cutoff
    pub snapshot_days: usize,
    /// Width of the holdout window scored during training
    pub holdout_days: u32,
    pub imputer: DemandImputer,
    pub forecaster: DemandForecaster,
    pub lead_time: LeadTimePredictor,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("models"),
            cache_capacity: 128,
            worker_threads: 4,
            snapshot_days: 60,
            holdout_days: 28,
            imputer: DemandImputer::default(),
            forecaster: DemandForecaster::default(),
            lead_time: LeadTimePredictor::default(),
        }
    }
}

/// One complete, internally consistent set of trained models; replaced
/// wholesale on retrain, never mutated in place.
#[derive(Debug)]
pub struct Generation {
    pub demand: TrainedDemandModel,
    pub lead_time: TrainedLeadTimeModel,
    pub builder: FeatureBuilder,
    pub snapshot: HistorySnapshot,
    pub metadata: TrainingMetadata,
}

/// Report returned by a successful training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub rows_used: usize,
    /// Rows whose demand target the imputer raised
    pub imputed_rows: usize,
    pub stages_completed: Vec<TrainingStage>,
    pub duration: Duration,
    pub metrics: Option<EvaluationMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Ready,
    Untrained,
}

/// Snapshot of service health for the status operation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub cache: CacheStats,
}

/// The forecasting service: predict, train, status.
pub struct ForecastService {
    config: PipelineConfig,
    store: ArtifactStore,
    cache: PredictionCache,
    pool: WorkerPool,
    active: RwLock<Option<Arc<Generation>>>,
    /// Training is exclusive with other training runs, never with
    /// serving.
    train_lock: Mutex<()>,
}

impl ForecastService {
    /// Start untrained, ignoring any artifacts on disk.
    pub fn new(config: PipelineConfig) -> Self {
        let store = ArtifactStore::new(&config.artifact_dir);
        let cache = PredictionCache::new(config.cache_capacity);
        let pool = WorkerPool::new(config.worker_threads);
        Self {
            config,
            store,
            cache,
            pool,
            active: RwLock::new(None),
            train_lock: Mutex::new(()),
        }
    }

    /// Start the service, activating the persisted generation when one
    /// exists and validates. Corrupt or schema-mismatched artifacts are
    /// logged and the service starts untrained; they are never served.
    pub fn open(config: PipelineConfig) -> Result<Self> {
        let service = Self::new(config);
        match service.load_generation() {
            Ok(Some(generation)) => {
                info!(
                    "startup: activated generation trained at {} over {} rows",
                    generation.metadata.trained_at, generation.metadata.rows_used
                );
                *service.active.write() = Some(Arc::new(generation));
            }
            Ok(None) => {
                info!("startup: no persisted artifacts, starting untrained");
            }
            Err(DemandError::ArtifactCorruption(detail)) => {
                warn!("startup: discarding stored artifacts: {detail}");
            }
            Err(err) => return Err(err),
        }
        Ok(service)
    }

    fn load_generation(&self) -> Result<Option<Generation>> {
        let imputer: Option<ImputerModel> = self.store.load(ArtifactKind::Imputer)?;
        let demand: Option<TrainedDemandModel> = self.store.load(ArtifactKind::Forecaster)?;
        let lead_time: Option<TrainedLeadTimeModel> =
            self.store.load(ArtifactKind::LeadTimePredictor)?;
        let metadata: Option<TrainingMetadata> = self.store.load(ArtifactKind::Metadata)?;
        let snapshot: Option<HistorySnapshot> = self.store.load(ArtifactKind::HistorySnapshot)?;

        let present = [
            imputer.is_some(),
            demand.is_some(),
            lead_time.is_some(),
            metadata.is_some(),
            snapshot.is_some(),
        ];
        if present.iter().all(|p| !p) {
            return Ok(None);
        }
        let (Some(imputer), Some(demand), Some(lead_time), Some(metadata), Some(snapshot)) =
            (imputer, demand, lead_time, metadata, snapshot)
        else {
            return Err(DemandError::ArtifactCorruption(
                "incomplete artifact generation on disk".to_string(),
            ));
        };

        // Stored payloads are untrusted until their schemas line up
        // with what this build of the feature builder produces.
        let expected_demand = FeatureBuilder::demand_schema();
        let expected_context = FeatureBuilder::context_schema();
        let expected_lead = FeatureBuilder::lead_time_schema();
        if metadata.demand_fingerprint != expected_demand.fingerprint()
            || metadata.context_fingerprint != expected_context.fingerprint()
            || metadata.lead_time_fingerprint != expected_lead.fingerprint()
        {
            return Err(DemandError::ArtifactCorruption(
                "stored schema fingerprints do not match the current feature schemas".to_string(),
            ));
        }
        if demand.schema().fingerprint() != metadata.demand_fingerprint
            || lead_time.schema().fingerprint() != metadata.lead_time_fingerprint
            || imputer.schema().fingerprint() != metadata.context_fingerprint
        {
            return Err(DemandError::ArtifactCorruption(
                "model artifacts disagree with the metadata fingerprints".to_string(),
            ));
        }
        if demand.linear().width() != expected_demand.len()
            || lead_time.linear().width() != expected_lead.len()
        {
            return Err(DemandError::ArtifactCorruption(
                "model parameter width does not match its schema".to_string(),
            ));
        }

        let builder = FeatureBuilder {
            encoders: metadata.encoders.clone(),
        };
        Ok(Some(Generation {
            demand,
            lead_time,
            builder,
            snapshot,
            metadata,
        }))
    }

    /// 7-day forecast for one store-SKU pair, cache-first.
    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult> {
        let generation = self
            .active
            .read()
            .clone()
            .ok_or(DemandError::ModelNotTrained)?;

        match self.cache.begin(request) {
            CacheLookup::Hit(result) => Ok(result),
            CacheLookup::Compute(ticket) => {
                let task_generation = Arc::clone(&generation);
                let task_request = request.clone();
                let outcome = self
                    .pool
                    .run(move || run_inference(&task_generation, &task_request));
                match outcome {
                    Some(Ok(result)) => {
                        self.cache.complete(request, result.clone(), ticket);
                        Ok(result)
                    }
                    Some(Err(err)) => {
                        self.cache.abort(request);
                        Err(err)
                    }
                    None => {
                        self.cache.abort(request);
                        Err(DemandError::Data(
                            "inference worker pool is unavailable".to_string(),
                        ))
                    }
                }
            }
        }
    }

    /// Run the full training sequence against a CSV source, replace the
    /// active generation and clear the cache. All-or-nothing: any stage
    /// failure leaves the previous generation authoritative.
    pub fn train(&self, source: &Path) -> Result<TrainingReport> {
        let _exclusive = self.train_lock.lock();
        let started = Instant::now();

        info!("training: started from {}", source.display());
        let history =
            DataLoader::from_csv(source).map_err(stage_failure(TrainingStage::Ingest))?;
        self.run_training(&history, started)
    }

    /// Train directly from an in-memory corpus, for embedders that do
    /// not stage their data through CSV files.
    pub fn train_from_history(&self, history: &SalesHistory) -> Result<TrainingReport> {
        let _exclusive = self.train_lock.lock();
        let started = Instant::now();
        if history.is_empty() {
            return Err(DemandError::Training {
                stage: TrainingStage::Ingest,
                cause: Box::new(DemandError::Data("empty training corpus".to_string())),
            });
        }
        self.run_training(history, started)
    }

    fn run_training(&self, history: &SalesHistory, started: Instant) -> Result<TrainingReport> {
        let mut stages_completed = vec![TrainingStage::Ingest];
        let builder = FeatureBuilder::fit(history);

        let imputer_model = self
            .config
            .imputer
            .fit(history, &builder)
            .map_err(stage_failure(TrainingStage::Imputer))?;
        let imputed = imputer_model.impute(history, &builder);
        let imputed_rows = imputed.iter().filter(|r| r.imputed).count();
        stages_completed.push(TrainingStage::Imputer);

        let demand_model = self
            .config
            .forecaster
            .fit(history, &imputed, &builder)
            .map_err(stage_failure(TrainingStage::Forecaster))?;
        stages_completed.push(TrainingStage::Forecaster);

        let lead_time_model = self
            .config
            .lead_time
            .fit(history, &builder)
            .map_err(stage_failure(TrainingStage::LeadTime))?;
        stages_completed.push(TrainingStage::LeadTime);

        let metrics = match evaluate(
            history,
            &self.config.imputer,
            &self.config.forecaster,
            &self.config.lead_time,
            self.config.holdout_days,
        ) {
            Ok(metrics) => {
                stages_completed.push(TrainingStage::Evaluation);
                Some(metrics)
            }
            Err(err) => {
                warn!("training: holdout evaluation skipped: {err}");
                None
            }
        };

        let demand_values: Vec<f64> = imputed.iter().map(|r| r.demand).collect();
        let snapshot = HistorySnapshot::build(history, &demand_values, self.config.snapshot_days);
        let metadata = TrainingMetadata {
            demand_fingerprint: FeatureBuilder::demand_schema().fingerprint(),
            context_fingerprint: FeatureBuilder::context_schema().fingerprint(),
            lead_time_fingerprint: FeatureBuilder::lead_time_schema().fingerprint(),
            trained_at: Utc::now(),
            rows_used: history.len(),
            imputer_fallback: imputer_model.is_fallback(),
            encoders: builder.encoders.clone(),
        };

        // Metadata goes last: a generation without it never activates,
        // so a crash mid-persist cannot publish a mixed set.
        let persist = || -> Result<()> {
            self.store.save(ArtifactKind::Imputer, &imputer_model)?;
            self.store.save(ArtifactKind::Forecaster, &demand_model)?;
            self.store
                .save(ArtifactKind::LeadTimePredictor, &lead_time_model)?;
            self.store.save(ArtifactKind::HistorySnapshot, &snapshot)?;
            self.store.save(ArtifactKind::Metadata, &metadata)?;
            Ok(())
        };
        persist().map_err(stage_failure(TrainingStage::Persist))?;
        stages_completed.push(TrainingStage::Persist);

        let generation = Generation {
            demand: demand_model,
            lead_time: lead_time_model,
            builder,
            snapshot,
            metadata,
        };
        *self.active.write() = Some(Arc::new(generation));
        self.cache.clear();

        let report = TrainingReport {
            rows_used: history.len(),
            imputed_rows,
            stages_completed,
            duration: started.elapsed(),
            metrics,
        };
        info!(
            "training: complete in {:.1}s over {} rows ({} imputed)",
            report.duration.as_secs_f64(),
            report.rows_used,
            report.imputed_rows
        );
        Ok(report)
    }

    pub fn status(&self) -> ServiceStatus {
        let state = if self.active.read().is_some() {
            ServiceState::Ready
        } else {
            ServiceState::Untrained
        };
        ServiceStatus {
            state,
            cache: self.cache.stats(),
        }
    }

    /// The currently active generation, if any.
    pub fn generation(&self) -> Option<Arc<Generation>> {
        self.active.read().clone()
    }
}

fn run_inference(generation: &Generation, request: &PredictionRequest) -> Result<PredictionResult> {
    let tail = generation
        .snapshot
        .find(&request.store_id, &request.sku_id)
        .ok_or_else(|| DemandError::UnknownEntity {
            store_id: request.store_id.clone(),
            sku_id: request.sku_id.clone(),
        })?;

    // Category and brand come from the request, not a catalog lookup.
    let entity = EntityRef {
        store_id: &request.store_id,
        sku_id: &request.sku_id,
        category: &request.category,
        brand: &request.brand,
    };

    let demand_days = generation.demand.forecast_week(
        &generation.builder,
        entity,
        &tail.context,
        &tail.demand,
        request.start_date,
    )?;

    let mut days = Vec::with_capacity(demand_days.len());
    for day in demand_days {
        let demand_attribution = explain_linear(
            generation.demand.linear(),
            generation.demand.schema(),
            &day.features,
        );
        let (lead_time_days, lead_features) = generation.lead_time.predict_day(
            &generation.builder,
            day.date,
            entity,
            &tail.context,
        );
        let lead_time_attribution = explain_linear(
            generation.lead_time.linear(),
            generation.lead_time.schema(),
            &lead_features,
        );
        days.push(DailyForecast {
            date: day.date,
            units_sold: day.units,
            lead_time_days,
            demand_attribution,
            lead_time_attribution,
        });
    }

    Ok(PredictionResult {
        request: request.clone(),
        days,
        status: ForecastStatus::Complete,
    })
}
