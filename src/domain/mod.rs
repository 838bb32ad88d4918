pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod settings;
pub mod throughput;

pub use config::{LoggingConfig, StorageConfig, SyncConfig};
pub use error::DomainError;
pub use event::{BackendEvent, ModelStateEvent};
pub use model::{DownloadProgress, EngineType, ModelRecord, ModelState};
pub use settings::{OperationKey, Setting, SettingKey, SettingsSnapshot, ShortcutBinding};
pub use throughput::{DownloadStats, ThroughputEstimator};
