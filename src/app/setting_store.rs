use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::domain::{
    DomainError, OperationKey, Setting, SettingKey, SettingsSnapshot, ShortcutBinding,
};
use crate::ports::backend::commands;
use crate::ports::{invoke, invoke_as, Backend, SettingsPersistence};

/// Operations started and not yet resolved for one key.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    outstanding: u32,
    /// Version of the most recently started operation.
    latest: u64,
}

struct SettingState {
    /// What readers see: committed values plus pending optimistic writes.
    current: Arc<SettingsSnapshot>,
    /// Last backend-confirmed values. Always equal to durable storage.
    committed: SettingsSnapshot,
    in_flight: HashMap<OperationKey, InFlight>,
    /// Version of the newest confirmed operation per key, while the key is busy.
    committed_versions: HashMap<OperationKey, u64>,
    next_version: u64,
    last_error: Option<String>,
}

impl SettingState {
    fn begin(&mut self, op: &OperationKey) -> u64 {
        self.next_version += 1;
        let version = self.next_version;
        let entry = self.in_flight.entry(op.clone()).or_insert(InFlight {
            outstanding: 0,
            latest: version,
        });
        entry.outstanding += 1;
        entry.latest = version;
        version
    }

    fn is_latest(&self, op: &OperationKey, version: u64) -> bool {
        self.in_flight.get(op).map(|entry| entry.latest) == Some(version)
    }

    /// Make the visible value of `op` equal to its value in `source`.
    fn restore_from(&mut self, op: &OperationKey, source: &SettingsSnapshot) {
        let mut next = (*self.current).clone();
        op.copy_value(source, &mut next);
        if next != *self.current {
            self.current = Arc::new(next);
        }
    }

    fn restore(&mut self, op: &OperationKey) {
        let committed = self.committed.clone();
        self.restore_from(op, &committed);
    }

    fn finish(&mut self, op: &OperationKey) {
        let Some(entry) = self.in_flight.get_mut(op) else {
            return;
        };
        entry.outstanding = entry.outstanding.saturating_sub(1);
        if entry.outstanding == 0 {
            self.in_flight.remove(op);
            self.committed_versions.remove(op);
            self.restore(op);
        }
    }
}

/// Marks an operation resolved when dropped, whatever the outcome.
struct InFlightGuard<'a> {
    store: &'a SettingStore,
    op: OperationKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.store.state.write().finish(&self.op);
    }
}

/// Settings and key bindings with optimistic updates.
///
/// Every mutation is applied to the visible snapshot immediately and confirmed by the
/// backend afterwards. A rejected or failed call restores only the affected key.
pub struct SettingStore {
    backend: Arc<dyn Backend>,
    persistence: Arc<dyn SettingsPersistence>,
    state: RwLock<SettingState>,
}

impl SettingStore {
    pub fn new(backend: Arc<dyn Backend>, persistence: Arc<dyn SettingsPersistence>) -> Self {
        let snapshot = SettingsSnapshot::default();
        Self {
            backend,
            persistence,
            state: RwLock::new(SettingState {
                current: Arc::new(snapshot.clone()),
                committed: snapshot,
                in_flight: HashMap::new(),
                committed_versions: HashMap::new(),
                next_version: 0,
                last_error: None,
            }),
        }
    }

    /// Current snapshot. Never partially updated.
    pub fn snapshot(&self) -> Arc<SettingsSnapshot> {
        Arc::clone(&self.state.read().current)
    }

    pub fn get_setting(&self, key: SettingKey) -> Setting {
        self.state.read().current.get(key)
    }

    pub fn binding(&self, id: &str) -> Option<ShortcutBinding> {
        self.state.read().current.binding(id).cloned()
    }

    /// Whether an operation on `op` has started and not yet resolved.
    pub fn is_updating(&self, op: impl Into<OperationKey>) -> bool {
        self.state.read().in_flight.contains_key(&op.into())
    }

    pub fn updating_keys(&self) -> Vec<OperationKey> {
        self.state.read().in_flight.keys().cloned().collect()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.state.write().last_error = None;
    }

    /// Show the persisted snapshot right away, then replace it with the backend's.
    pub async fn hydrate(&self) -> Result<(), DomainError> {
        match self.persistence.load() {
            Ok(Some(snapshot)) => {
                let mut state = self.state.write();
                state.committed = snapshot.clone();
                state.current = Arc::new(snapshot);
                debug!("Settings hydrated from durable storage");
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "Ignoring unreadable persisted settings"),
        }

        self.refresh().await
    }

    /// Replace the snapshot with the backend's and persist it.
    ///
    /// Keys with an operation still in flight keep their optimistic value.
    pub async fn refresh(&self) -> Result<(), DomainError> {
        let snapshot: SettingsSnapshot = match invoke_as(
            self.backend.as_ref(),
            commands::GET_APP_SETTINGS,
            Value::Null,
        )
        .await
        {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(error = %err, "Failed to load settings");
                self.state.write().last_error = Some(format!("Failed to load settings: {}", err));
                return Err(err);
            }
        };

        let mut guard = self.state.write();
        let state = &mut *guard;
        if let Err(err) = self.persist(&snapshot) {
            state.last_error = Some(format!("Failed to save settings: {}", err));
            return Err(err);
        }

        let mut visible = snapshot.clone();
        for op in state.in_flight.keys() {
            op.copy_value(&state.current, &mut visible);
        }
        state.current = Arc::new(visible);
        state.committed = snapshot;
        info!(pending = state.in_flight.len(), "Settings refreshed from backend");
        Ok(())
    }

    /// Apply `setting` optimistically and confirm it with the backend.
    pub async fn update_setting(&self, setting: Setting) -> Result<(), DomainError> {
        let key = setting.key();
        let params = setting.params();
        self.run_optimistic(
            OperationKey::Setting(key),
            move |snapshot| snapshot.set(setting.clone()),
            key.command(),
            params,
        )
        .await
    }

    /// Restore the registered default of `key`. Keys without a default are left alone.
    pub async fn reset_setting(&self, key: SettingKey) -> Result<(), DomainError> {
        match key.default_setting() {
            Some(default) => self.update_setting(default).await,
            None => {
                debug!(key = %key, "No default registered, nothing to reset");
                Ok(())
            }
        }
    }

    /// Rebind the shortcut `id` to `binding`.
    pub async fn update_binding(&self, id: &str, binding: &str) -> Result<(), DomainError> {
        let op = OperationKey::binding(id);
        self.ensure_binding(&op, id)?;

        let (bound_id, bound_to) = (id.to_string(), binding.to_string());
        self.run_optimistic(
            op,
            move |snapshot| {
                snapshot.set_binding(&bound_id, &bound_to);
            },
            commands::CHANGE_BINDING,
            json!({ "id": id, "binding": binding }),
        )
        .await
    }

    /// Reset the shortcut `id` on the backend and reload every setting.
    ///
    /// The default binding is platform-dependent, so nothing is applied locally first.
    pub async fn reset_binding(&self, id: &str) -> Result<(), DomainError> {
        let op = OperationKey::binding(id);
        self.ensure_binding(&op, id)?;

        let version = self.state.write().begin(&op);
        let _guard = InFlightGuard {
            store: self,
            op: op.clone(),
        };
        debug!(op = %op, version, "Resetting binding");

        match invoke(
            self.backend.as_ref(),
            commands::RESET_BINDING,
            json!({ "id": id }),
        )
        .await
        {
            Ok(_) => self.refresh().await,
            Err(err) => Err(self.fail(&op, err)),
        }
    }

    fn ensure_binding(&self, op: &OperationKey, id: &str) -> Result<(), DomainError> {
        if self.state.read().current.binding(id).is_some() {
            return Ok(());
        }
        Err(self.fail(op, DomainError::UnknownBinding(id.to_string())))
    }

    async fn run_optimistic<F>(
        &self,
        op: OperationKey,
        apply: F,
        command: &str,
        params: Value,
    ) -> Result<(), DomainError>
    where
        F: Fn(&mut SettingsSnapshot) + Send + Sync,
    {
        let (version, before) = {
            let mut state = self.state.write();
            let version = state.begin(&op);
            let before = Arc::clone(&state.current);
            let mut next = (*before).clone();
            apply(&mut next);
            state.current = Arc::new(next);
            (version, before)
        };
        let _guard = InFlightGuard {
            store: self,
            op: op.clone(),
        };
        debug!(op = %op, version, command, "Optimistic update applied");

        let outcome = match invoke(self.backend.as_ref(), command, params).await {
            Ok(_) => self.commit(&op, version, &apply),
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            self.rollback(&op, version, &before);
            return Err(self.fail(&op, err));
        }
        Ok(())
    }

    fn commit<F>(&self, op: &OperationKey, version: u64, apply: &F) -> Result<(), DomainError>
    where
        F: Fn(&mut SettingsSnapshot),
    {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let newest = state.committed_versions.get(op).copied().unwrap_or(0);
        if version < newest {
            debug!(op = %op, version, newest, "Confirmation superseded by a newer one");
            return Ok(());
        }

        // Storage and the committed snapshot change together or not at all.
        let mut committed = state.committed.clone();
        apply(&mut committed);
        self.persist(&committed)?;

        state.committed = committed;
        state.committed_versions.insert(op.clone(), version);
        info!(op = %op, version, "Update confirmed");
        Ok(())
    }

    /// Undo the optimistic write of `version` by restoring the value `op` had just
    /// before it was applied.
    fn rollback(&self, op: &OperationKey, version: u64, before: &SettingsSnapshot) {
        let mut state = self.state.write();
        if state.is_latest(op, version) {
            state.restore_from(op, before);
            info!(op = %op, version, "Optimistic update rolled back");
        } else {
            // A newer write owns the visible value now.
            debug!(op = %op, version, "Skipping rollback of superseded update");
        }
    }

    fn persist(&self, snapshot: &SettingsSnapshot) -> Result<(), DomainError> {
        self.persistence.save(snapshot).map_err(|err| {
            error!(error = %err, "Failed to persist settings");
            err
        })
    }

    fn fail(&self, op: &OperationKey, err: DomainError) -> DomainError {
        warn!(op = %op, error = %err, "Settings operation failed");
        self.state.write().last_error = Some(format!("Failed to update {}: {}", op, err));
        err
    }
}
