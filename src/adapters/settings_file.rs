use std::fs;
use std::path::PathBuf;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::domain::{DomainError, SettingsSnapshot};
use crate::ports::SettingsPersistence;

/// Settings snapshot persisted as a JSON file.
pub struct JsonSettingsFile {
    path: PathBuf,
}

impl JsonSettingsFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SettingsPersistence for JsonSettingsFile {
    fn load(&self) -> Result<Option<SettingsSnapshot>, DomainError> {
        if !self.path.exists() {
            debug!(path = ?self.path, "No persisted settings");
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let snapshot: SettingsSnapshot = serde_json::from_str(&content)?;
        debug!(path = ?self.path, "Persisted settings loaded");
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &SettingsSnapshot) -> Result<(), DomainError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Atomic replace.
        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(snapshot)?;
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;

        info!(path = ?self.path, "Settings persisted");
        Ok(())
    }
}

/// In-memory persistence for headless use and tests.
#[derive(Default)]
pub struct MemorySettingsStore {
    snapshot: RwLock<Option<SettingsSnapshot>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: SettingsSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
        }
    }
}

impl SettingsPersistence for MemorySettingsStore {
    fn load(&self) -> Result<Option<SettingsSnapshot>, DomainError> {
        Ok(self.snapshot.read().clone())
    }

    fn save(&self, snapshot: &SettingsSnapshot) -> Result<(), DomainError> {
        *self.snapshot.write() = Some(snapshot.clone());
        Ok(())
    }
}
