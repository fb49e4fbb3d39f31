//! Crate-wide error types
//!
//! One `thiserror` enum per concern, following the data store module's
//! convention of a dedicated error type rather than a single catch-all.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

#[derive(Error, Debug)]
pub enum MetricsSourceError {
    #[error("request to metrics backend failed: {0}")]
    Request(String),

    #[error("metrics backend returned a non-success status: {0}")]
    NonSuccess(String),
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("transient failure calling {provider}: {reason}")]
    Transient { provider: &'static str, reason: String },

    #[error("{provider} returned a response with no usable content")]
    Empty { provider: &'static str },

    #[error("both primary and secondary providers failed")]
    AllProvidersFailed,
}

#[derive(Error, Debug)]
pub enum DataStoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("window already processed for this tenant")]
    AlreadyProcessed,
}

pub type DataStoreResult<T> = Result<T, DataStoreError>;

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("chat webhook request failed: {0}")]
    Chat(String),

    #[error("email send failed: {0}")]
    Email(String),
}
