//! Client-side state synchronization for an application backend.
//!
//! Settings and key bindings are updated optimistically and rolled back when the
//! backend refuses a change. Downloadable models are tracked through download and
//! extraction, with throughput estimates fed by backend progress events.

#![forbid(unsafe_code)]

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;

#[cfg(test)]
mod test_support;

pub use app::{AppController, EventBridge, ModelLifecycleStore, SettingStore};
pub use domain::{
    BackendEvent, DomainError, DownloadProgress, DownloadStats, ModelRecord, ModelState,
    OperationKey, Setting, SettingKey, SettingsSnapshot, ShortcutBinding, SyncConfig,
};
pub use ports::{Backend, CommandResult, SettingsPersistence};
