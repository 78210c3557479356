//! Outcome of one command/response exchange.

use serde::{Deserialize, Serialize};

/// Classification of a single driver call.
///
/// Every call produces exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// Terminator observed and no error marker in the response
    Success,
    /// Terminator observed but the response carries an error marker
    ErrorMessage,
    /// Terminator not observed even after the nudge
    Hang,
}

impl Classification {
    /// Whether the caller must recover the link before continuing
    #[must_use]
    pub const fn needs_recovery(self) -> bool {
        matches!(self, Self::Hang)
    }

    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ErrorMessage => "error-message",
            Self::Hang => "hang",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
