use crate::domain::{DomainError, SettingsSnapshot};

/// Durable key-value storage for the committed settings snapshot.
pub trait SettingsPersistence: Send + Sync {
    /// Load the last persisted snapshot, or None if nothing was saved yet.
    fn load(&self) -> Result<Option<SettingsSnapshot>, DomainError>;

    /// Replace the persisted snapshot.
    fn save(&self, snapshot: &SettingsSnapshot) -> Result<(), DomainError>;
}
