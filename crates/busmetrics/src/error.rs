//! Feature error types

use busmetrics_pipeline::PipelineError;
use busmetrics_reporting::ReportError;
use thiserror::Error;

/// Result type for the metrics feature
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Errors raised while configuring or starting the metrics feature
#[derive(Debug, Error)]
pub enum MetricsError {
    /// An option was given an unusable value
    #[error("invalid {option}: {message}")]
    InvalidOption {
        option: &'static str,
        message: String,
    },

    /// Probe id does not name a known probe
    #[error("unknown probe '{0}'")]
    UnknownProbe(String),

    /// Report registration failed
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Stage placement failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Logging could not be initialized
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

impl MetricsError {
    pub fn invalid_option(option: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option,
            message: message.into(),
        }
    }
}
