//! Reporting error types

use std::time::Duration;

use busmetrics_pipeline::PipelineError;
use thiserror::Error;

/// Errors raised while registering or running reports
#[derive(Debug, Error)]
pub enum ReportError {
    /// Report interval must be greater than zero
    #[error("report '{name}' has a zero interval")]
    InvalidInterval { name: String },

    /// Registration name is already taken
    #[error("report '{0}' is already registered")]
    DuplicateReport(String),

    /// The scheduler has already been started
    #[error("report scheduler already started")]
    AlreadyStarted,
}

/// Failure delivering one payload to one sink
#[derive(Debug, Error)]
pub enum SinkError {
    /// The transport rejected the report message
    #[error("dispatch to '{destination}' failed: {source}")]
    Dispatch {
        destination: String,
        #[source]
        source: PipelineError,
    },

    /// A user-supplied report callback failed
    #[error("custom report failed: {0}")]
    Callback(String),

    /// The sink panicked while delivering
    #[error("delivery panicked: {0}")]
    Panicked(String),

    /// Delivery did not finish in time
    #[error("delivery to '{destination}' timed out after {timeout:?}")]
    Timeout {
        destination: String,
        timeout: Duration,
    },
}

/// Result type for report registration
pub type Result<T> = std::result::Result<T, ReportError>;
