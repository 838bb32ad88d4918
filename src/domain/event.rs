use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{DomainError, DownloadProgress};

pub const MODEL_DOWNLOAD_PROGRESS: &str = "model-download-progress";
pub const MODEL_DOWNLOAD_COMPLETE: &str = "model-download-complete";
pub const MODEL_EXTRACTION_STARTED: &str = "model-extraction-started";
pub const MODEL_EXTRACTION_COMPLETED: &str = "model-extraction-completed";
pub const MODEL_EXTRACTION_FAILED: &str = "model-extraction-failed";
pub const MODEL_DELETED: &str = "model-deleted";
pub const MODEL_STATE_CHANGED: &str = "model-state-changed";
pub const SETTINGS_CHANGED: &str = "settings-changed";

/// Payload of a model load/unload notice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelStateEvent {
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Events pushed by the backend without a preceding call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum BackendEvent {
    ModelDownloadProgress(DownloadProgress),
    ModelDownloadComplete {
        model_id: String,
    },
    ModelExtractionStarted {
        model_id: String,
    },
    ModelExtractionCompleted {
        model_id: String,
    },
    ModelExtractionFailed {
        model_id: String,
        error: String,
    },
    ModelDeleted {
        model_id: Option<String>,
    },
    ModelStateChanged(ModelStateEvent),
    SettingsChanged {
        setting: Option<String>,
        value: Option<Value>,
    },
}

impl BackendEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BackendEvent::ModelDownloadProgress(_) => MODEL_DOWNLOAD_PROGRESS,
            BackendEvent::ModelDownloadComplete { .. } => MODEL_DOWNLOAD_COMPLETE,
            BackendEvent::ModelExtractionStarted { .. } => MODEL_EXTRACTION_STARTED,
            BackendEvent::ModelExtractionCompleted { .. } => MODEL_EXTRACTION_COMPLETED,
            BackendEvent::ModelExtractionFailed { .. } => MODEL_EXTRACTION_FAILED,
            BackendEvent::ModelDeleted { .. } => MODEL_DELETED,
            BackendEvent::ModelStateChanged(_) => MODEL_STATE_CHANGED,
            BackendEvent::SettingsChanged { .. } => SETTINGS_CHANGED,
        }
    }

    /// Model id the event refers to, if any.
    pub fn model_id(&self) -> Option<&str> {
        match self {
            BackendEvent::ModelDownloadProgress(progress) => Some(&progress.model_id),
            BackendEvent::ModelDownloadComplete { model_id }
            | BackendEvent::ModelExtractionStarted { model_id }
            | BackendEvent::ModelExtractionCompleted { model_id }
            | BackendEvent::ModelExtractionFailed { model_id, .. } => Some(model_id),
            BackendEvent::ModelDeleted { model_id } => model_id.as_deref(),
            BackendEvent::ModelStateChanged(state) => state.model_id.as_deref(),
            BackendEvent::SettingsChanged { .. } => None,
        }
    }

    /// Decode a raw named event as emitted over IPC.
    ///
    /// Id-only events are emitted either as a bare string or as `{"model_id": ...}`.
    pub fn from_named(name: &str, payload: Value) -> Result<Self, DomainError> {
        let event = match name {
            MODEL_DOWNLOAD_PROGRESS => {
                BackendEvent::ModelDownloadProgress(serde_json::from_value(payload)?)
            }
            MODEL_DOWNLOAD_COMPLETE => BackendEvent::ModelDownloadComplete {
                model_id: model_id_from(name, &payload)?,
            },
            MODEL_EXTRACTION_STARTED => BackendEvent::ModelExtractionStarted {
                model_id: model_id_from(name, &payload)?,
            },
            MODEL_EXTRACTION_COMPLETED => BackendEvent::ModelExtractionCompleted {
                model_id: model_id_from(name, &payload)?,
            },
            MODEL_EXTRACTION_FAILED => {
                #[derive(Deserialize)]
                struct Failed {
                    model_id: String,
                    #[serde(default)]
                    error: String,
                }
                let failed: Failed = serde_json::from_value(payload)?;
                BackendEvent::ModelExtractionFailed {
                    model_id: failed.model_id,
                    error: failed.error,
                }
            }
            MODEL_DELETED => BackendEvent::ModelDeleted {
                model_id: model_id_from(name, &payload).ok(),
            },
            MODEL_STATE_CHANGED => {
                let state = if payload.is_null() {
                    ModelStateEvent::default()
                } else {
                    serde_json::from_value(payload)?
                };
                BackendEvent::ModelStateChanged(state)
            }
            SETTINGS_CHANGED => BackendEvent::SettingsChanged {
                setting: payload
                    .get("setting")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                value: payload.get("value").cloned(),
            },
            other => return Err(DomainError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }
}

fn model_id_from(name: &str, payload: &Value) -> Result<String, DomainError> {
    match payload {
        Value::String(id) => Ok(id.clone()),
        Value::Object(map) => map
            .get("model_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DomainError::Serialization(format!("{} payload has no model_id", name))),
        _ => Err(DomainError::Serialization(format!(
            "{} payload is not a model id",
            name
        ))),
    }
}
