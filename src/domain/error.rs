use thiserror::Error;

/// Domain-level errors for the synchronization core.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    /// The backend answered the call with an `error` status.
    #[error("{command} failed: {message}")]
    Backend { command: String, message: String },

    /// The call never produced a backend answer.
    #[error("Transport error during {command}: {message}")]
    Transport { command: String, message: String },

    #[error("Unexpected response from {command}: {message}")]
    InvalidResponse { command: String, message: String },

    #[error("Unknown key binding: {0}")]
    UnknownBinding(String),

    #[error("Model {0} is being extracted")]
    ModelExtracting(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
