//! Step errors
//!
//! Only infrastructure problems are errors. Silence, NACKs and rule violations
//! are reported as outcomes, and cancellation ends a step in `Done`.

use thiserror::Error;

/// Errors that abort a step
#[derive(Debug, Error)]
pub enum StepError {
    #[error("bus error: {0}")]
    Bus(#[from] j1939_bus::BusError),

    #[error("decode error: {0}")]
    Decode(#[from] j1939_core::DecodeError),

    #[error("conversion error: {0}")]
    Conv(#[from] j1939_conv::ConvError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// State machine was driven out of order
    #[error("invalid step transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

/// Result type for step operations
pub type StepResult<T> = Result<T, StepError>;
