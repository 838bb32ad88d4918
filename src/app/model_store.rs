use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::domain::{
    DomainError, DownloadProgress, DownloadStats, ModelRecord, ModelState, ThroughputEstimator,
};
use crate::ports::backend::commands;
use crate::ports::{invoke, invoke_as, Backend};

#[derive(Default)]
struct LifecycleState {
    catalog: Arc<Vec<ModelRecord>>,
    downloading: HashSet<String>,
    extracting: HashSet<String>,
    progress: HashMap<String, DownloadProgress>,
    estimator: ThroughputEstimator,
    last_error: Option<String>,
}

impl LifecycleState {
    fn record(&self, model_id: &str) -> Option<&ModelRecord> {
        self.catalog.iter().find(|m| m.id == model_id)
    }

    /// Drop the progress sample and throughput stats of `model_id`.
    fn clear_transfer(&mut self, model_id: &str) -> bool {
        let had_progress = self.progress.remove(model_id).is_some();
        let had_stats = self.estimator.remove(model_id).is_some();
        had_progress || had_stats
    }
}

/// Model catalog and the download/extraction lifecycle of each model.
///
/// The backend owns the catalog. Local sets only describe work in flight and are
/// rebuilt from the catalog on every reload.
pub struct ModelLifecycleStore {
    backend: Arc<dyn Backend>,
    state: RwLock<LifecycleState>,
}

impl ModelLifecycleStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: RwLock::new(LifecycleState::default()),
        }
    }

    /// Fetch the catalog and rebuild the downloading set from it.
    pub async fn load_models(&self) -> Result<(), DomainError> {
        let models: Vec<ModelRecord> = match invoke_as(
            self.backend.as_ref(),
            commands::GET_AVAILABLE_MODELS,
            Value::Null,
        )
        .await
        {
            Ok(models) => models,
            Err(err) => {
                error!(error = %err, "Failed to load models");
                self.state.write().last_error = Some(format!("Failed to load models: {}", err));
                return Err(err);
            }
        };

        let mut guard = self.state.write();
        let state = &mut *guard;

        let known: HashMap<&str, &ModelRecord> =
            models.iter().map(|m| (m.id.as_str(), m)).collect();
        state
            .extracting
            .retain(|id| known.get(id.as_str()).is_some_and(|m| !m.is_downloaded));
        let extracting = &state.extracting;
        state.downloading = models
            .iter()
            .filter(|m| m.is_downloading && !extracting.contains(&m.id))
            .map(|m| m.id.clone())
            .collect();

        let downloading = &state.downloading;
        state.progress.retain(|id, _| downloading.contains(id));
        state.estimator.retain(|id| downloading.contains(id));

        info!(
            models = models.len(),
            downloading = state.downloading.len(),
            extracting = state.extracting.len(),
            "Model catalog loaded"
        );
        state.catalog = Arc::new(models);
        Ok(())
    }

    /// Ask the backend to download `model_id`.
    ///
    /// Returns once the backend accepted the request; completion arrives as events.
    pub async fn download_model(&self, model_id: &str) -> Result<(), DomainError> {
        {
            let mut state = self.state.write();
            if state.extracting.contains(model_id) {
                let err = DomainError::ModelExtracting(model_id.to_string());
                state.last_error = Some(err.to_string());
                return Err(err);
            }
            if !state.downloading.insert(model_id.to_string()) {
                debug!(model_id, "Model already marked as downloading");
            }
        }
        info!(model_id, "Requesting model download");

        match invoke(
            self.backend.as_ref(),
            commands::DOWNLOAD_MODEL,
            json!({ "modelId": model_id }),
        )
        .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(model_id, error = %err, "Model download rejected");
                let mut state = self.state.write();
                state.downloading.remove(model_id);
                state.clear_transfer(model_id);
                state.last_error = Some(format!("Failed to download model {}: {}", model_id, err));
                Err(err)
            }
        }
    }

    /// Delete `model_id` on the backend and reload the catalog.
    ///
    /// Nothing changes locally until the backend confirms; it may refuse, e.g. for
    /// the model currently in use.
    pub async fn delete_model(&self, model_id: &str) -> Result<(), DomainError> {
        info!(model_id, "Requesting model deletion");
        if let Err(err) = invoke(
            self.backend.as_ref(),
            commands::DELETE_MODEL,
            json!({ "modelId": model_id }),
        )
        .await
        {
            warn!(model_id, error = %err, "Model deletion failed");
            self.state.write().last_error =
                Some(format!("Failed to delete model {}: {}", model_id, err));
            return Err(err);
        }

        self.load_models().await
    }

    /// Apply a progress sample observed at `now`.
    ///
    /// Samples for models that are not downloading are dropped: they arrive late for
    /// downloads that already failed, finished or moved on to extraction. Downloads
    /// started elsewhere are picked up by `load_models` from `is_downloading`.
    ///
    /// The newest sample is always cached for display. The throughput estimator
    /// decides on its own whether the sample is far enough from the previous one
    /// to count.
    pub fn on_progress(&self, progress: DownloadProgress, now: Instant) {
        let mut state = self.state.write();
        let model_id = progress.model_id.clone();

        if !state.downloading.contains(&model_id) {
            debug!(model_id = %model_id, "Ignoring progress for untracked download");
            return;
        }

        let downloaded = progress.downloaded;
        state.progress.insert(model_id.clone(), progress);
        state.estimator.record(&model_id, downloaded, now);
    }

    /// Forget the transfer of `model_id`. Returns false if nothing was tracked.
    pub fn on_download_complete(&self, model_id: &str) -> bool {
        let mut state = self.state.write();
        let was_downloading = state.downloading.remove(model_id);
        let had_transfer = state.clear_transfer(model_id);
        was_downloading || had_transfer
    }

    /// The bytes are on disk and the backend started unpacking them.
    pub fn on_extraction_started(&self, model_id: &str) {
        let mut state = self.state.write();
        state.downloading.remove(model_id);
        state.clear_transfer(model_id);
        if state.extracting.insert(model_id.to_string()) {
            info!(model_id, "Model extraction started");
        }
    }

    /// Returns false if `model_id` was not being extracted.
    pub fn on_extraction_completed(&self, model_id: &str) -> bool {
        let removed = self.state.write().extracting.remove(model_id);
        if removed {
            info!(model_id, "Model extraction completed");
        }
        removed
    }

    /// Record the extraction error. Returns false if `model_id` was not being extracted.
    pub fn on_extraction_failed(&self, model_id: &str, error: &str) -> bool {
        let mut state = self.state.write();
        if !state.extracting.remove(model_id) {
            return false;
        }
        warn!(model_id, error, "Model extraction failed");
        state.last_error = Some(format!("Failed to extract model {}: {}", model_id, error));
        true
    }

    pub fn models(&self) -> Arc<Vec<ModelRecord>> {
        Arc::clone(&self.state.read().catalog)
    }

    pub fn model(&self, model_id: &str) -> Option<ModelRecord> {
        self.state.read().record(model_id).cloned()
    }

    pub fn downloaded_models(&self) -> Vec<ModelRecord> {
        self.state
            .read()
            .catalog
            .iter()
            .filter(|m| m.is_downloaded)
            .cloned()
            .collect()
    }

    pub fn model_state(&self, model_id: &str) -> Option<ModelState> {
        let state = self.state.read();
        if state.extracting.contains(model_id) {
            return Some(ModelState::Extracting);
        }
        if state.downloading.contains(model_id) {
            return Some(ModelState::Downloading);
        }
        state.record(model_id).map(|m| {
            if m.is_downloaded {
                ModelState::Downloaded
            } else {
                ModelState::Idle
            }
        })
    }

    pub fn is_model_downloading(&self, model_id: &str) -> bool {
        self.state.read().downloading.contains(model_id)
    }

    pub fn is_model_extracting(&self, model_id: &str) -> bool {
        self.state.read().extracting.contains(model_id)
    }

    pub fn downloading_models(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.read().downloading.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn download_progress(&self, model_id: &str) -> Option<DownloadProgress> {
        self.state.read().progress.get(model_id).cloned()
    }

    pub fn download_stats(&self, model_id: &str) -> Option<DownloadStats> {
        self.state.read().estimator.stats(model_id).copied()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.state.write().last_error = None;
    }
}
