//! Loading persisted transcripts.

use std::path::{Path, PathBuf};
use tether_core::{CoreError, TranscriptLine};

/// Errors from reading a transcript
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    /// The transcript file does not exist
    #[error("Transcript not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Any other I/O failure
    #[error("Transcript I/O error on {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },
}

impl From<TranscriptError> for CoreError {
    fn from(err: TranscriptError) -> Self {
        match err {
            TranscriptError::NotFound { path } => CoreError::NotFound {
                kind: "Transcript".to_string(),
                id: path.display().to_string(),
            },
            TranscriptError::Io { reason, .. } => CoreError::Io { reason },
        }
    }
}

/// Read a transcript file into numbered lines.
///
/// Bytes that are not valid UTF-8 are replaced, never rejected.
///
/// # Errors
///
/// Returns `NotFound` if the file is missing, `Io` for any other read failure
pub fn read_transcript(path: impl AsRef<Path>) -> Result<Vec<TranscriptLine>, TranscriptError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TranscriptError::NotFound {
            path: path.to_path_buf(),
        },
        _ => TranscriptError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(TranscriptLine::number_all(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_transcript() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gsp ] google_tests foo").unwrap();
        writeln!(file, "5 Tests 0 Failures 0 Ignored").unwrap();
        let lines = read_transcript(file.path()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].number.as_u64(), 2);
    }

    #[test]
    fn test_read_transcript_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ok\n\xff\xfebad\n").unwrap();
        let lines = read_transcript(file.path()).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].text.ends_with("bad"));
        assert!(lines[1].text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_read_transcript_missing() {
        let err = read_transcript("/nonexistent/run.log").unwrap_err();
        assert!(matches!(err, TranscriptError::NotFound { .. }));
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::NotFound { .. }));
    }
}
