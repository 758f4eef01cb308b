// src/error.rs

use thiserror::Error;

/// Failures surfaced by the control engine. None of them are fatal; every
/// path leaves the tracking state machine in a well-defined state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// Location access not granted. Start is aborted, state stays Idle.
    #[error("location permission has not been granted")]
    PermissionDenied,

    /// Rejected at the configuration boundary before reaching the mapper.
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("location subscription failed: {0}")]
    Subscription(String),

    #[error("unknown speed unit: {0}")]
    UnknownSpeedUnit(String),

    /// The controller was built off any Tokio runtime and none was given.
    #[error("no Tokio runtime available to run the tracking workers")]
    NoRuntime,
}

/// Output sink write failures. Logged and counted by the volume worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("output sink refused the write: {0}")]
    Refused(String),

    #[error("output sink is unavailable")]
    Unavailable,
}
