//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while setting up or running a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Broker connection error.
    #[error("Broker connection error: {0}")]
    BrokerConnection(String),

    /// Publishing error.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<sensorlog_common::Error> for BridgeError {
    fn from(err: sensorlog_common::Error) -> Self {
        match err {
            sensorlog_common::Error::Io(e) => Self::Io(e),
            sensorlog_common::Error::Zenoh(e) => Self::BrokerConnection(e.to_string()),
            other => Self::Config(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A message could not be handed to the broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The broker rejected or could not accept the message.
    #[error("Failed to publish to {topic}: {message}")]
    Rejected { topic: String, message: String },

    /// The broker connection has failed; nothing more can be delivered.
    #[error("Broker transport failed: {0}")]
    Transport(String),
}
