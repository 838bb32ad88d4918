use std::path::PathBuf;

use crate::domain::{DomainError, SyncConfig};

/// Where the core's own configuration lives.
pub trait ConfigStore: Send + Sync {
    /// Read the configuration, writing defaults first if there is none.
    fn load(&self) -> Result<SyncConfig, DomainError>;

    fn save(&self, config: &SyncConfig) -> Result<(), DomainError>;

    fn config_path(&self) -> PathBuf;

    /// Directory holding the configuration and the persisted settings.
    fn data_dir(&self) -> PathBuf;

    fn logs_dir(&self) -> PathBuf;
}
