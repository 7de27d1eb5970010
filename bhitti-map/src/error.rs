//! Error types for bhitti-map

use crate::config::{ConfigLoadError, SettingsError};
use crate::io::PersistenceError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Store and session error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid settings or map policy
    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    /// Configuration file could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigLoadError),

    /// Map save or load failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// I/O error (thread spawn, filesystem)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background worker exited before answering
    #[error("Worker gone: {0}")]
    WorkerGone(&'static str),

    /// A background worker's queue is full; the request was not queued
    #[error("Worker busy: {0}")]
    WorkerBusy(&'static str),
}
