//! Process start: load frozen artifacts and wire the scoring service.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::ann::{load_artifacts, DenseNetwork, FrozenArtifacts};
use crate::adapters::sqlite::SqliteHistoryStore;
use crate::adapters::StorageError;
use crate::application::{FeatureEncoder, RiskPredictor, ScoringService};
use crate::config::AppConfig;
use crate::ports::{Classifier, HistoryStore, ModelError};
use crate::MedipulseError;

/// Service as deployed: dense network over SQLite history.
pub type DefaultScoringService = ScoringService<DenseNetwork, SqliteHistoryStore>;

/// Build the deployed service from configuration.
///
/// Any artifact or storage problem here is fatal to startup.
///
/// # Errors
/// Returns `Config` for an invalid configuration, `Model` for missing,
/// corrupt or unverified artifacts, and `Storage` if the history database
/// cannot be opened.
pub fn boot(config: &AppConfig) -> Result<DefaultScoringService, MedipulseError> {
    config.validate()?;
    tracing::info!("Loading artifacts from {:?}", config.artifacts_dir);
    let artifacts = load_artifacts(&config.artifacts_dir, config.allow_unverified_artifacts)?;

    let store = open_store(&config.database_path, config)?;
    assemble(artifacts, Arc::new(store), config)
}

fn open_store(path: &Path, config: &AppConfig) -> Result<SqliteHistoryStore, MedipulseError> {
    let busy_timeout = Duration::from_millis(config.request_timeout_ms);
    Ok(SqliteHistoryStore::open(path, config.history_capacity, busy_timeout)?)
}

/// Wire already-loaded artifacts to any history store.
///
/// # Errors
/// Returns `Config` if `config` fails validation, and `Model` if the schema
/// is inconsistent or its width differs from the network's input layer.
pub fn assemble<S>(
    artifacts: FrozenArtifacts,
    store: Arc<S>,
    config: &AppConfig,
) -> Result<ScoringService<DenseNetwork, S>, MedipulseError>
where
    S: HistoryStore,
    S::Error: Into<StorageError>,
{
    config.validate()?;
    let FrozenArtifacts { schema, network } = artifacts;

    let encoder = FeatureEncoder::new(schema).map_err(ModelError::InvalidArtifact)?;
    if encoder.dimension() != network.input_dim() {
        return Err(ModelError::DimensionMismatch {
            expected: encoder.dimension(),
            actual: network.input_dim(),
        }
        .into());
    }

    let threshold = config.decision_threshold()?;
    let predictor = RiskPredictor::new(Arc::new(network), threshold);
    tracing::info!(
        "Scoring service ready (threshold={}, history_capacity={})",
        threshold.value(),
        store.capacity()
    );

    Ok(ScoringService::new(
        Arc::new(encoder),
        Arc::new(predictor),
        store,
        config.scoring_policy(),
    ))
}
