use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Maximum number of log files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            max_files: 7,
        }
    }
}

/// Durable storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// File name of the persisted settings snapshot, relative to the data directory.
    pub settings_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_file: "settings_store.json".to_string(),
        }
    }
}

/// Main configuration of the synchronization core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

impl SyncConfig {
    /// Create a new SyncConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }
}
