//! Core error types for TETHER.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Not found
    NotFound { kind: String, id: String },

    /// I/O failure
    Io { reason: String },

    /// Parse error
    ParseError { message: String },

    /// Validation error
    Validation { field: String, reason: String },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::Io { reason } => write!(f, "IO error: {}", reason),
            Self::ParseError { message } => write!(f, "Parse error: {}", message),
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::NotFound {
            kind: "Transcript".to_string(),
            id: "run.log".to_string(),
        };
        assert_eq!(format!("{}", err), "Transcript not found: run.log");
    }

    #[test]
    fn test_validation_error() {
        let err = CoreError::Validation {
            field: "terminator".to_string(),
            reason: "must not be empty".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("terminator"));
        assert!(s.contains("must not be empty"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::ParseError { .. }));
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::Io { reason: "gone".to_string() };
        let err2 = CoreError::Io { reason: "gone".to_string() };
        assert_eq!(err1, err2);
        assert_ne!(err1, CoreError::ParseError { message: "gone".to_string() });
    }
}
