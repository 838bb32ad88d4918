use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{JsonSettingsFile, TomlConfigStore};
use crate::app::{EventBridge, ModelLifecycleStore, SettingStore};
use crate::domain::{DomainError, SyncConfig};
use crate::infrastructure::init_logging;
use crate::ports::{Backend, ConfigStore};

/// Application controller that wires configuration, logging, the stores and the
/// event bridge around one backend.
pub struct AppController {
    config: RwLock<SyncConfig>,
    config_store: Arc<TomlConfigStore>,
    settings: Arc<SettingStore>,
    models: Arc<ModelLifecycleStore>,
    bridge: Arc<EventBridge>,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Build the controller with configuration under the OS data directory of
    /// `app_name`. Must be called from within a tokio runtime.
    pub fn new(app_name: &str, backend: Arc<dyn Backend>) -> Result<Self, DomainError> {
        let config_store = TomlConfigStore::new(app_name)?;
        Self::with_config_store(config_store, backend)
    }

    pub fn with_config_store(
        config_store: TomlConfigStore,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, DomainError> {
        let config_store = Arc::new(config_store);
        let config = config_store.load()?;

        let log_guard = init_logging(&config_store.logs_dir(), &config.logging)?;

        info!(app = config_store.app_name(), "Synchronization core starting up");

        let settings_path = config_store.data_dir().join(&config.storage.settings_file);
        let persistence = Arc::new(JsonSettingsFile::new(settings_path));

        let settings = Arc::new(SettingStore::new(backend.clone(), persistence));
        let models = Arc::new(ModelLifecycleStore::new(backend.clone()));
        let bridge = Arc::new(EventBridge::new(settings.clone(), models.clone()));
        bridge.start(backend.as_ref());

        info!("AppController initialized");

        Ok(Self {
            config: RwLock::new(config),
            config_store,
            settings,
            models,
            bridge,
            _log_guard: log_guard,
        })
    }

    /// Load settings and the model catalog. A failure of one does not stop the other.
    pub async fn initialize(&self) -> Result<(), DomainError> {
        let (settings, models) = tokio::join!(self.settings.hydrate(), self.models.load_models());

        if let Err(err) = &models {
            warn!(error = %err, "Initial model catalog load failed");
        }
        settings?;
        models
    }

    pub fn settings(&self) -> &Arc<SettingStore> {
        &self.settings
    }

    pub fn models(&self) -> &Arc<ModelLifecycleStore> {
        &self.models
    }

    pub fn bridge(&self) -> &Arc<EventBridge> {
        &self.bridge
    }

    /// Get the current configuration.
    pub fn config(&self) -> SyncConfig {
        self.config.read().clone()
    }

    /// Save a new configuration. Logging and storage changes apply on next start.
    pub fn update_config(&self, config: SyncConfig) -> Result<(), DomainError> {
        self.config_store.save(&config)?;
        *self.config.write() = config;

        info!("Configuration updated");
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.config_store.data_dir()
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.config_store.logs_dir()
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_store.config_path()
    }
}

impl Drop for AppController {
    fn drop(&mut self) {
        self.bridge.shutdown();
    }
}
