//! Transcript line types.
//!
//! A transcript is plain text; every line is addressed by its 1-based
//! position in the file. Numbers are assigned once when the transcript is
//! loaded and never change afterwards, even when a reader un-reads a line.

use serde::{Deserialize, Serialize};

/// 1-based line number inside one transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineNumber(u64);

impl LineNumber {
    /// Create from raw value
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Get raw value
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Line number `n` lines after this one
    #[must_use]
    pub const fn offset(&self, n: u64) -> Self {
        Self(self.0.saturating_add(n))
    }
}

impl std::fmt::Display for LineNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LineNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// An immutable numbered line of transcript text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    /// Position in the transcript
    pub number: LineNumber,
    /// Line content without the trailing newline
    pub text: String,
}

impl TranscriptLine {
    /// Create a new transcript line
    #[must_use]
    pub fn new(number: LineNumber, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    /// Number the lines of `text` starting at 1
    #[must_use]
    pub fn number_all(text: &str) -> Vec<Self> {
        text.lines()
            .enumerate()
            .map(|(i, line)| Self::new(LineNumber::from_raw(i as u64 + 1), line))
            .collect()
    }
}
