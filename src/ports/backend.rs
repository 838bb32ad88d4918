use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::domain::{BackendEvent, DomainError};

/// Backend command names used by the stores.
pub mod commands {
    pub const GET_APP_SETTINGS: &str = "get_app_settings";
    pub const CHANGE_BINDING: &str = "change_binding";
    pub const RESET_BINDING: &str = "reset_binding";
    pub const GET_AVAILABLE_MODELS: &str = "get_available_models";
    pub const DOWNLOAD_MODEL: &str = "download_model";
    pub const DELETE_MODEL: &str = "delete_model";
}

/// Answer of the backend to a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CommandResult {
    Ok {
        #[serde(default)]
        data: Value,
    },
    Error {
        error: String,
    },
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        CommandResult::Ok { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        CommandResult::Error {
            error: message.into(),
        }
    }

    /// Turn an `error` status into [`DomainError::Backend`].
    pub fn into_result(self, command: &str) -> Result<Value, DomainError> {
        match self {
            CommandResult::Ok { data } => Ok(data),
            CommandResult::Error { error } => Err(DomainError::Backend {
                command: command.to_string(),
                message: error,
            }),
        }
    }
}

/// Port to the backend process.
///
/// Implementations carry commands over whatever IPC the host application uses and
/// forward the backend's push events.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Issue a command and wait for its answer.
    ///
    /// A rejected command is `Ok(CommandResult::Error)`. `Err` means the call itself
    /// failed and no answer was received.
    async fn call(&self, command: &str, params: Value) -> Result<CommandResult, DomainError>;

    /// Subscribe to backend push events.
    fn subscribe(&self) -> broadcast::Receiver<BackendEvent>;
}

/// Call `command` and return its data, folding rejections into the error.
pub async fn invoke(
    backend: &dyn Backend,
    command: &str,
    params: Value,
) -> Result<Value, DomainError> {
    backend.call(command, params).await?.into_result(command)
}

/// Like [`invoke`], deserializing the returned data.
pub async fn invoke_as<T: DeserializeOwned>(
    backend: &dyn Backend,
    command: &str,
    params: Value,
) -> Result<T, DomainError> {
    let data = invoke(backend, command, params).await?;
    serde_json::from_value(data).map_err(|e| DomainError::InvalidResponse {
        command: command.to_string(),
        message: e.to_string(),
    })
}
