//! Error types for the interview engine.

/// Top-level error type for the interview engine.
#[derive(Debug, thiserror::Error)]
pub enum InterviewError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Every input for the open question was dropped, e.g. stdin hit EOF.
    #[error("Interview closed before completion: no input left for the open question")]
    Closed,
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failure of a caller-supplied transform or validate computation.
///
/// This is a failure of the computation itself, not a validation rejection:
/// rejections are plain reasons and never travel through this type.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{reason}")]
    Failed { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StepError {
    /// Build a failure from a plain message.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Result type alias for the interview engine.
pub type Result<T> = std::result::Result<T, InterviewError>;
