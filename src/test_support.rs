//! Scripted in-process backend for store tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, oneshot};

use crate::domain::{BackendEvent, DomainError, EngineType, ModelRecord, SettingsSnapshot};
use crate::ports::backend::commands;
use crate::ports::{Backend, CommandResult};

#[derive(Clone)]
enum Reply {
    Answer(CommandResult),
    Transport(String),
}

struct Hold {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Handle on a call that is parked inside the fake backend.
pub struct HeldCall {
    entered: Option<oneshot::Receiver<()>>,
    release: oneshot::Sender<()>,
}

impl HeldCall {
    /// Wait until the held call has reached the backend.
    pub async fn entered(&mut self) {
        if let Some(rx) = self.entered.take() {
            let _ = rx.await;
        }
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

pub struct FakeBackend {
    sticky: Mutex<HashMap<String, Reply>>,
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    holds: Mutex<HashMap<String, VecDeque<Hold>>>,
    calls: Mutex<Vec<(String, Value)>>,
    events: Mutex<Option<broadcast::Sender<BackendEvent>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::with_event_capacity(64)
    }

    /// Backend whose event channel buffers at most `capacity` events per subscriber.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _rx) = broadcast::channel(capacity);
        Self {
            sticky: Mutex::new(HashMap::new()),
            queued: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Some(events)),
        }
    }

    /// Answer every call to `command` with `result` unless a one-shot reply is queued.
    pub fn respond(&self, command: &str, result: CommandResult) {
        self.sticky
            .lock()
            .insert(command.to_string(), Reply::Answer(result));
    }

    pub fn respond_once(&self, command: &str, result: CommandResult) {
        self.queued
            .lock()
            .entry(command.to_string())
            .or_default()
            .push_back(Reply::Answer(result));
    }

    pub fn fail_transport_once(&self, command: &str, message: &str) {
        self.queued
            .lock()
            .entry(command.to_string())
            .or_default()
            .push_back(Reply::Transport(message.to_string()));
    }

    /// Park the next call to `command` until the returned handle is released.
    pub fn hold(&self, command: &str) -> HeldCall {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.holds
            .lock()
            .entry(command.to_string())
            .or_default()
            .push_back(Hold {
                entered: entered_tx,
                release: release_rx,
            });
        HeldCall {
            entered: Some(entered_rx),
            release: release_tx,
        }
    }

    pub fn emit(&self, event: BackendEvent) {
        if let Some(events) = self.events.lock().as_ref() {
            let _ = events.send(event);
        }
    }

    /// Drop the event sender so subscribers see the stream close.
    pub fn close_events(&self) {
        self.events.lock().take();
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, command: &str) -> usize {
        self.calls.lock().iter().filter(|(c, _)| c == command).count()
    }

    pub fn set_settings(&self, snapshot: &SettingsSnapshot) {
        self.respond(
            commands::GET_APP_SETTINGS,
            CommandResult::ok(serde_json::to_value(snapshot).unwrap()),
        );
    }

    pub fn set_catalog(&self, models: &[ModelRecord]) {
        self.respond(commands::GET_AVAILABLE_MODELS, CommandResult::ok(json!(models)));
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn call(&self, command: &str, params: Value) -> Result<CommandResult, DomainError> {
        self.calls.lock().push((command.to_string(), params));

        let hold = self
            .holds
            .lock()
            .get_mut(command)
            .and_then(|queue| queue.pop_front());
        if let Some(hold) = hold {
            let _ = hold.entered.send(());
            let _ = hold.release.await;
        }

        let queued = self
            .queued
            .lock()
            .get_mut(command)
            .and_then(|queue| queue.pop_front());
        let reply = queued.or_else(|| self.sticky.lock().get(command).cloned());

        match reply {
            Some(Reply::Answer(result)) => Ok(result),
            Some(Reply::Transport(message)) => Err(DomainError::Transport {
                command: command.to_string(),
                message,
            }),
            None => Ok(CommandResult::ok(Value::Null)),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        match self.events.lock().as_ref() {
            Some(events) => events.subscribe(),
            None => broadcast::channel(1).1,
        }
    }
}

pub fn model(id: &str, is_downloaded: bool, is_downloading: bool) -> ModelRecord {
    ModelRecord {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        filename: format!("{}.bin", id),
        url: None,
        size_mb: 100,
        is_downloaded,
        is_downloading,
        partial_size: 0,
        is_directory: false,
        engine_type: EngineType::Whisper,
        accuracy_score: 0.5,
        speed_score: 0.5,
    }
}
