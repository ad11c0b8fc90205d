//! Pipeline error types
//!
//! Errors raised while building the stage order or dispatching operations.

use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage was placed relative to a stage that is never registered
    #[error("stage '{stage}' is anchored on unknown stage '{anchor}'")]
    UnknownAnchor { stage: String, anchor: String },

    /// Two stages share a name
    #[error("stage '{0}' is registered more than once")]
    DuplicateStage(String),

    /// The transport rejected a dispatch
    #[error("dispatch to '{destination}' failed: {message}")]
    Transport {
        destination: String,
        message: String,
    },

    /// A stage aborted the dispatch
    #[error("stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },
}

impl PipelineError {
    pub fn transport(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            destination: destination.into(),
            message: message.into(),
        }
    }

    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
