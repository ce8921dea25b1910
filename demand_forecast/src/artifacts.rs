//! On-disk persistence for trained model artifacts.
//!
//! Every artifact is JSON written to a temporary sibling and renamed
//! into place, so a crashed or failed save never leaves a torn file
//! where `load` can see it. Deserialized payloads are treated as
//! untrusted until the pipeline validates their schema fingerprints.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{DemandError, Result};
use crate::features::Encoders;

/// The artifact kinds one trained generation consists of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Imputer,
    Forecaster,
    LeadTimePredictor,
    Metadata,
    HistorySnapshot,
}

impl ArtifactKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Imputer => "imputer.json",
            ArtifactKind::Forecaster => "forecaster.json",
            ArtifactKind::LeadTimePredictor => "lead_time_predictor.json",
            ArtifactKind::Metadata => "metadata.json",
            ArtifactKind::HistorySnapshot => "history_snapshot.json",
        }
    }
}

/// Generation-wide training record persisted next to the models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub demand_fingerprint: String,
    pub context_fingerprint: String,
    pub lead_time_fingerprint: String,
    pub trained_at: DateTime<Utc>,
    pub rows_used: usize,
    pub imputer_fallback: bool,
    /// Label encoders shared by every model of the generation
    pub encoders: Encoders,
}

/// Filesystem store with atomic replace semantics.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.file_name())
    }

    /// Serialize and atomically publish one artifact.
    pub fn save<T: Serialize>(&self, kind: ArtifactKind, value: &T) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(kind);
        let tmp = path.with_extension("json.tmp");

        let payload = serde_json::to_vec_pretty(value)?;
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &path)?;
        info!("artifact saved: {}", path.display());
        Ok(())
    }

    /// Load one artifact; `Ok(None)` when it was never saved. A present
    /// but unreadable payload is corruption, not absence.
    pub fn load<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<Option<T>> {
        let path = self.path_for(kind);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let value = serde_json::from_str(&raw).map_err(|err| {
            DemandError::ArtifactCorruption(format!(
                "{} failed to deserialize: {err}",
                path.display()
            ))
        })?;
        info!("artifact loaded: {}", path.display());
        Ok(Some(value))
    }
}
