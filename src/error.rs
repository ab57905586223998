//! Error types for LFP-BMS
//!
//! Protection trips and precondition violations are not errors; they are
//! reported through the status snapshot and the log. The variants below
//! cover the I/O-bound edges of the system: configuration, persistent
//! storage, sensor reads, the web server and operator input.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BmsError>;

#[derive(Debug, Error)]
pub enum BmsError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A configuration value or operator argument out of range
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    /// YAML config or JSON state that failed to parse or render
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// The sensor driver could not deliver a reading this tick
    #[error("Sensor error: {message}")]
    Sensor { message: String },

    /// SOH state store unreadable or unwritable
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Web server error: {message}")]
    Web { message: String },
}

macro_rules! message_ctor {
    ($($name:ident => $variant:ident),* $(,)?) => {
        $(
            pub fn $name<S: Into<String>>(message: S) -> Self {
                BmsError::$variant { message: message.into() }
            }
        )*
    };
}

impl BmsError {
    message_ctor! {
        config => Config,
        io => Io,
        serialization => Serialization,
        sensor => Sensor,
        storage => Storage,
        web => Web,
    }

    pub fn validation<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        BmsError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Operator-facing text: the bare message for validation failures,
    /// the full description otherwise
    pub fn user_message(&self) -> String {
        match self {
            BmsError::Validation { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for BmsError {
    fn from(err: std::io::Error) -> Self {
        BmsError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for BmsError {
    fn from(err: serde_yaml::Error) -> Self {
        BmsError::serialization(err.to_string())
    }
}

impl From<serde_json::Error> for BmsError {
    fn from(err: serde_json::Error) -> Self {
        BmsError::serialization(err.to_string())
    }
}
