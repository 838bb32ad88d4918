use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::domain::{DomainError, SyncConfig};
use crate::ports::ConfigStore;

const CONFIG_FILE: &str = "sync.toml";

/// `sync.toml` under an application directory, plus the directory logs go to.
pub struct TomlConfigStore {
    app_name: String,
    data_dir: PathBuf,
    logs_dir: PathBuf,
}

impl TomlConfigStore {
    /// Store under the OS application directories for `app_name`.
    ///
    /// | OS      | config                               | logs                              |
    /// |---------|--------------------------------------|-----------------------------------|
    /// | macOS   | `~/Library/Application Support/<app>` | `<config>/logs`                   |
    /// | Windows | `%APPDATA%\<app>`                     | `%LOCALAPPDATA%\<app>\logs`       |
    /// | Linux   | `~/.config/<app>`                     | `~/.local/share/<app>/logs`       |
    pub fn new(app_name: &str) -> Result<Self, DomainError> {
        let data_dir = platform_data_dir(app_name)?;
        let logs_dir = platform_logs_dir(app_name).unwrap_or_else(|| data_dir.join("logs"));
        Self::open(app_name, data_dir, logs_dir)
    }

    /// Store rooted at `data_dir`; logs go to `data_dir/logs`.
    pub fn with_data_dir(app_name: &str, data_dir: PathBuf) -> Result<Self, DomainError> {
        let logs_dir = data_dir.join("logs");
        Self::open(app_name, data_dir, logs_dir)
    }

    fn open(app_name: &str, data_dir: PathBuf, logs_dir: PathBuf) -> Result<Self, DomainError> {
        // Ensure the data directory exists
        fs::create_dir_all(&data_dir)?;
        debug!(app = app_name, data_dir = ?data_dir, logs_dir = ?logs_dir, "Config store opened");

        Ok(Self {
            app_name: app_name.to_string(),
            data_dir,
            logs_dir,
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    fn parse(path: &Path) -> Result<SyncConfig, DomainError> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            DomainError::Config(format!("Invalid configuration in {}: {}", path.display(), e))
        })
    }
}

fn platform_data_dir(app_name: &str) -> Result<PathBuf, DomainError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::config_dir();

    base.map(|dir| dir.join(app_name))
        .ok_or_else(|| DomainError::Config("Could not find application data directory".into()))
}

fn platform_logs_dir(app_name: &str) -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let base = dirs::data_local_dir();
    #[cfg(target_os = "linux")]
    let base = dirs::data_dir();
    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    let base: Option<PathBuf> = None;

    base.map(|dir| dir.join(app_name).join("logs"))
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<SyncConfig, DomainError> {
        let path = self.config_path();

        // First run: persist defaults so the file can be edited
        if !path.exists() {
            info!(path = ?path, "No configuration found, writing defaults");
            let config = SyncConfig::new();
            self.save(&config)?;
            return Ok(config);
        }

        let config = Self::parse(&path)?;
        info!(path = ?path, level = %config.logging.level, "Configuration loaded");
        Ok(config)
    }

    fn save(&self, config: &SyncConfig) -> Result<(), DomainError> {
        let path = self.config_path();
        let tmp = path.with_extension("toml.tmp");

        // Write to a sibling file, then swap it in
        fs::write(&tmp, toml::to_string_pretty(config)?)?;
        fs::rename(&tmp, &path)?;

        debug!(path = ?path, "Configuration saved");
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.logs_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &tempfile::TempDir) -> TomlConfigStore {
        TomlConfigStore::with_data_dir("syncstate-test", dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_explicit_root_keeps_everything_inside() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);

        assert_eq!(store.config_path(), dir.path().join("sync.toml"));
        assert_eq!(store.logs_dir(), dir.path().join("logs"));
        assert_eq!(store.app_name(), "syncstate-test");
    }

    #[test]
    fn test_missing_config_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);

        let config = store.load().unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(store.config_path().exists());
    }

    #[test]
    fn test_saved_config_is_loaded_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);

        let mut config = SyncConfig::new();
        config.logging.max_files = 3;
        config.storage.settings_file = "prefs.json".to_string();
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.logging.max_files, 3);
        assert_eq!(loaded.storage.settings_file, "prefs.json");
        assert!(!dir.path().join("sync.toml.tmp").exists());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        fs::write(store.config_path(), "[logging]\nlevel = \"trace\"\n").unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.logging.level, "trace");
        assert!(config.logging.file_logging);
        assert_eq!(config.storage.settings_file, "settings_store.json");
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        fs::write(store.config_path(), "logging = 5").unwrap();

        assert!(matches!(store.load(), Err(DomainError::Config(_))));
    }
}
