//! Replay errors.

use std::path::PathBuf;
use tether_core::CoreError;
use tether_log::TranscriptError;

/// Errors from building an analyzer or loading a transcript.
///
/// Parsing ambiguity is never an error; it degrades to a timeout entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// The transcript does not exist
    #[error("Transcript not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The transcript or summary could not be read or written
    #[error("I/O error on {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    /// A result pattern failed to compile
    #[error("Invalid pattern for {field}: {reason}")]
    InvalidPattern { field: String, reason: String },

    /// The marker configuration was rejected
    #[error("Invalid markers: {0}")]
    InvalidMarkers(String),
}

impl From<TranscriptError> for ReplayError {
    fn from(err: TranscriptError) -> Self {
        match err {
            TranscriptError::NotFound { path } => Self::NotFound { path },
            TranscriptError::Io { path, reason } => Self::Io { path, reason },
        }
    }
}

impl From<ReplayError> for CoreError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::NotFound { path } => CoreError::NotFound {
                kind: "Transcript".to_string(),
                id: path.display().to_string(),
            },
            ReplayError::Io { reason, .. } => CoreError::Io { reason },
            other => CoreError::Validation {
                field: "replay".to_string(),
                reason: other.to_string(),
            },
        }
    }
}
