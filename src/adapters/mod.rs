pub mod config_store;
pub mod settings_file;

pub use config_store::TomlConfigStore;
pub use settings_file::{JsonSettingsFile, MemorySettingsStore};
