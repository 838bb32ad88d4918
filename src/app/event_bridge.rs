use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::app::{ModelLifecycleStore, SettingStore};
use crate::domain::BackendEvent;
use crate::ports::Backend;

/// Applies backend push events to the stores.
///
/// One subscription per process. Events are drained by a single task, so they are
/// reconciled strictly in arrival order.
pub struct EventBridge {
    settings: Arc<SettingStore>,
    models: Arc<ModelLifecycleStore>,
    initialized: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventBridge {
    pub fn new(settings: Arc<SettingStore>, models: Arc<ModelLifecycleStore>) -> Self {
        Self {
            settings,
            models,
            initialized: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Subscribe to `backend` and start applying its events.
    ///
    /// Only the first call subscribes; later calls return false. Must be called from
    /// within a tokio runtime.
    pub fn start(self: &Arc<Self>, backend: &dyn Backend) -> bool {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("Event bridge already subscribed");
            return false;
        }

        let rx = backend.subscribe();
        let bridge = Arc::clone(self);
        let handle = tokio::spawn(async move { bridge.run(rx).await });
        *self.task.lock() = Some(handle);

        info!("Event bridge subscribed to backend events");
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Whether the event task is still draining the subscription.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop applying events. A later `start` subscribes again.
    pub fn shutdown(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("Event bridge stopped");
        }
        self.initialized.store(false, Ordering::SeqCst);
    }

    async fn run(&self, mut rx: broadcast::Receiver<BackendEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.dispatch(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event bridge lagged behind, resynchronizing");
                    self.resync().await;
                }
                Err(RecvError::Closed) => {
                    info!("Backend event stream closed");
                    break;
                }
            }
        }
    }

    /// Apply one event. Events for models that are not tracked change no local state.
    pub async fn dispatch(&self, event: BackendEvent) {
        trace!(event = event.name(), model_id = ?event.model_id(), "Backend event");

        match event {
            BackendEvent::ModelDownloadProgress(progress) => {
                self.models.on_progress(progress, Instant::now());
            }
            BackendEvent::ModelDownloadComplete { model_id } => {
                let tracked = self.models.on_download_complete(&model_id);
                // The catalog may still list the model as missing even if the
                // download was never tracked here.
                let listed_downloaded = self
                    .models
                    .model(&model_id)
                    .is_some_and(|record| record.is_downloaded);

                if tracked || !listed_downloaded {
                    info!(model_id = %model_id, tracked, "Model download complete");
                    self.reload_models().await;
                } else {
                    debug!(model_id = %model_id, "Duplicate download completion");
                }
            }
            BackendEvent::ModelExtractionStarted { model_id } => {
                self.models.on_extraction_started(&model_id);
            }
            BackendEvent::ModelExtractionCompleted { model_id } => {
                if self.models.on_extraction_completed(&model_id) {
                    self.reload_models().await;
                }
            }
            BackendEvent::ModelExtractionFailed { model_id, error } => {
                self.models.on_extraction_failed(&model_id, &error);
            }
            BackendEvent::ModelDeleted { .. } | BackendEvent::ModelStateChanged(_) => {
                self.reload_models().await;
            }
            BackendEvent::SettingsChanged { setting, .. } => {
                debug!(setting = ?setting, "Settings changed on backend");
                self.refresh_settings().await;
            }
        }
    }

    /// Reload everything after events may have been missed.
    async fn resync(&self) {
        self.reload_models().await;
        self.refresh_settings().await;
    }

    async fn reload_models(&self) {
        if let Err(err) = self.models.load_models().await {
            warn!(error = %err, "Model reload after event failed");
        }
    }

    async fn refresh_settings(&self) {
        if let Err(err) = self.settings.refresh().await {
            warn!(error = %err, "Settings refresh after event failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemorySettingsStore;
    use crate::domain::{DownloadProgress, ModelStateEvent, Setting, SettingKey, SettingsSnapshot};
    use crate::ports::backend::commands;
    use crate::test_support::{model, FakeBackend};
    use std::time::Duration;

    struct Fixture {
        backend: Arc<FakeBackend>,
        settings: Arc<SettingStore>,
        models: Arc<ModelLifecycleStore>,
        bridge: Arc<EventBridge>,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(FakeBackend::new());
        let settings = Arc::new(SettingStore::new(
            backend.clone(),
            Arc::new(MemorySettingsStore::new()),
        ));
        let models = Arc::new(ModelLifecycleStore::new(backend.clone()));
        let bridge = Arc::new(EventBridge::new(settings.clone(), models.clone()));
        Fixture {
            backend,
            settings,
            models,
            bridge,
        }
    }

    fn complete(model_id: &str) -> BackendEvent {
        BackendEvent::ModelDownloadComplete {
            model_id: model_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_download_lifecycle() {
        let f = fixture();
        f.backend.set_catalog(&[model("small", false, false)]);
        f.models.load_models().await.unwrap();
        f.models.download_model("small").await.unwrap();

        f.bridge
            .dispatch(BackendEvent::ModelDownloadProgress(DownloadProgress::new(
                "small", 5, 10,
            )))
            .await;
        assert_eq!(f.models.download_progress("small").unwrap().percentage, 50.0);
        assert!(f.models.download_stats("small").is_some());

        f.backend.set_catalog(&[model("small", true, false)]);
        f.bridge.dispatch(complete("small")).await;

        assert!(!f.models.is_model_downloading("small"));
        assert!(f.models.download_progress("small").is_none());
        assert!(f.models.download_stats("small").is_none());
        assert!(f.models.model("small").unwrap().is_downloaded);
    }

    #[tokio::test]
    async fn test_duplicate_completion_is_noop() {
        let f = fixture();
        f.models.download_model("small").await.unwrap();
        f.backend.set_catalog(&[model("small", true, false)]);

        f.bridge.dispatch(complete("small")).await;
        f.bridge.dispatch(complete("small")).await;

        assert_eq!(f.backend.calls_to(commands::GET_AVAILABLE_MODELS), 1);
        assert!(f.models.downloading_models().is_empty());
    }

    #[tokio::test]
    async fn test_untracked_completion_refreshes_stale_catalog() {
        let f = fixture();
        f.backend.set_catalog(&[model("small", false, false)]);
        f.models.load_models().await.unwrap();

        f.backend.set_catalog(&[model("small", true, false)]);
        f.bridge.dispatch(complete("small")).await;

        assert_eq!(f.backend.calls_to(commands::GET_AVAILABLE_MODELS), 2);
        assert!(f.models.model("small").unwrap().is_downloaded);
        assert!(f.models.downloading_models().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_events() {
        let f = fixture();
        f.models.download_model("parakeet").await.unwrap();
        let started = BackendEvent::ModelExtractionStarted {
            model_id: "parakeet".to_string(),
        };

        f.bridge.dispatch(started.clone()).await;
        f.bridge.dispatch(started).await;
        assert!(f.models.is_model_extracting("parakeet"));
        assert!(!f.models.is_model_downloading("parakeet"));

        f.bridge
            .dispatch(BackendEvent::ModelExtractionFailed {
                model_id: "parakeet".to_string(),
                error: "Failed to extract archive".to_string(),
            })
            .await;
        assert!(!f.models.is_model_extracting("parakeet"));
        assert!(f.models.last_error().unwrap().contains("Failed to extract archive"));
        assert_eq!(f.backend.calls_to(commands::GET_AVAILABLE_MODELS), 0);

        f.bridge
            .dispatch(BackendEvent::ModelExtractionStarted {
                model_id: "parakeet".to_string(),
            })
            .await;
        f.bridge
            .dispatch(BackendEvent::ModelExtractionCompleted {
                model_id: "parakeet".to_string(),
            })
            .await;
        assert!(!f.models.is_model_extracting("parakeet"));
        assert_eq!(f.backend.calls_to(commands::GET_AVAILABLE_MODELS), 1);
    }

    #[tokio::test]
    async fn test_notices_reload_unconditionally() {
        let f = fixture();
        f.backend
            .set_settings(&SettingsSnapshot::default().with(Setting::DebugMode(true)));

        f.bridge
            .dispatch(BackendEvent::ModelDeleted { model_id: None })
            .await;
        f.bridge
            .dispatch(BackendEvent::ModelStateChanged(ModelStateEvent::default()))
            .await;
        f.bridge
            .dispatch(BackendEvent::SettingsChanged {
                setting: Some("debug_mode".to_string()),
                value: Some(serde_json::json!(true)),
            })
            .await;

        assert_eq!(f.backend.calls_to(commands::GET_AVAILABLE_MODELS), 2);
        assert_eq!(f.settings.get_setting(SettingKey::DebugMode), Setting::DebugMode(true));
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        let mut waited = Duration::ZERO;
        while !done() && waited < Duration::from_secs(2) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
        }
    }

    #[tokio::test]
    async fn test_start_subscribes_once_and_applies_events() {
        let f = fixture();
        f.models.download_model("small").await.unwrap();
        assert!(!f.bridge.is_initialized());

        assert!(f.bridge.start(f.backend.as_ref()));
        assert!(!f.bridge.start(f.backend.as_ref()));
        assert!(f.bridge.is_initialized());

        f.backend
            .emit(BackendEvent::ModelDownloadProgress(DownloadProgress::new(
                "small", 1, 4,
            )));

        wait_until(|| f.models.download_progress("small").is_some()).await;
        assert_eq!(f.models.download_progress("small").unwrap().downloaded, 1);
        assert!(f.models.is_model_downloading("small"));

        f.bridge.shutdown();
        assert!(!f.bridge.is_initialized());
        assert!(f.bridge.start(f.backend.as_ref()));
        f.bridge.shutdown();
    }

    #[tokio::test]
    async fn test_lagged_subscription_resyncs_everything() {
        let backend = Arc::new(FakeBackend::with_event_capacity(2));
        backend.set_settings(&SettingsSnapshot::default().with(Setting::DebugMode(true)));
        backend.set_catalog(&[model("small", true, false)]);
        let settings = Arc::new(SettingStore::new(
            backend.clone(),
            Arc::new(MemorySettingsStore::new()),
        ));
        let models = Arc::new(ModelLifecycleStore::new(backend.clone()));
        let bridge = Arc::new(EventBridge::new(settings.clone(), models.clone()));

        assert!(bridge.start(backend.as_ref()));
        // The task has not run yet, so the receiver overflows.
        for id in ["a", "b", "c", "d", "e"] {
            backend.emit(BackendEvent::ModelExtractionFailed {
                model_id: id.to_string(),
                error: "ignored".to_string(),
            });
        }

        wait_until(|| {
            backend.calls_to(commands::GET_AVAILABLE_MODELS) == 1
                && backend.calls_to(commands::GET_APP_SETTINGS) == 1
        })
        .await;

        assert_eq!(backend.calls_to(commands::GET_AVAILABLE_MODELS), 1);
        assert_eq!(backend.calls_to(commands::GET_APP_SETTINGS), 1);
        assert_eq!(models.models().len(), 1);
        assert_eq!(settings.get_setting(SettingKey::DebugMode), Setting::DebugMode(true));
        assert!(models.last_error().is_none());
        bridge.shutdown();
    }

    #[tokio::test]
    async fn test_closed_stream_ends_task() {
        let f = fixture();
        assert!(f.bridge.start(f.backend.as_ref()));
        assert!(f.bridge.is_running());

        f.backend.close_events();
        wait_until(|| !f.bridge.is_running()).await;

        assert!(!f.bridge.is_running());
        assert!(f.backend.calls().is_empty());
    }
}
