//! Error types reported by the engine

use thiserror::Error;

/// Failures surfaced synchronously by engine calls.
///
/// Every mutating call that returns one of these leaves the engine exactly
/// as it was before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Mode selector not recognized
    #[error("unknown game mode: {0}")]
    UnknownMode(String),

    /// A sync or prediction call was issued before any mode load
    #[error("no game mode loaded; call a loader like load_standard first")]
    EngineNotLoaded,

    /// Snapshot contained non-finite or out-of-bounds fields
    #[error("invalid ball state: {0}")]
    InvalidState(String),

    /// Prediction horizon was non-positive or above the supported maximum
    #[error("invalid prediction duration: {0}s")]
    InvalidDuration(f32),

    /// Engine settings failed validation
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures while reading or writing a settings file
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
