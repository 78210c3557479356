//! Driver configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tether_core::{CoreError, CoreResult, MarkerConfig};

/// Command driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Idle prompt ending every response
    pub terminator: String,
    /// Read timeout for each of the two reads, in milliseconds
    pub read_timeout_ms: u64,
    /// Pause after a completed exchange, in milliseconds
    pub inter_command_delay_ms: u64,
    /// Quiet window used to drain stale input, in milliseconds
    pub drain_window_ms: u64,
    /// Byte sequences that turn a response into an error message
    pub error_markers: Vec<String>,
    /// Banner written to the transcript on a hang
    pub hang_banner: String,
}

impl DriverConfig {
    /// Take terminator, error markers and hang banner from `markers`
    #[must_use]
    pub fn from_markers(markers: &MarkerConfig) -> Self {
        Self {
            terminator: markers.prompt.clone(),
            read_timeout_ms: 100_000,
            inter_command_delay_ms: 200,
            drain_window_ms: 5,
            error_markers: markers.error_markers.clone(),
            hang_banner: markers.hang_banner.clone(),
        }
    }

    /// Set the default terminator
    #[must_use]
    pub fn with_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = terminator.into();
        self
    }

    /// Set the read timeout
    #[must_use]
    pub fn with_read_timeout(mut self, timeout_ms: u64) -> Self {
        self.read_timeout_ms = timeout_ms;
        self
    }

    /// Set the inter-command delay
    #[must_use]
    pub fn with_inter_command_delay(mut self, delay_ms: u64) -> Self {
        self.inter_command_delay_ms = delay_ms;
        self
    }

    /// Set the drain window
    #[must_use]
    pub fn with_drain_window(mut self, window_ms: u64) -> Self {
        self.drain_window_ms = window_ms;
        self
    }

    /// Read timeout as a duration
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Inter-command delay as a duration
    #[must_use]
    pub fn inter_command_delay(&self) -> Duration {
        Duration::from_millis(self.inter_command_delay_ms)
    }

    /// Drain window as a duration
    #[must_use]
    pub fn drain_window(&self) -> Duration {
        Duration::from_millis(self.drain_window_ms)
    }

    /// Check the configuration
    ///
    /// # Errors
    ///
    /// Returns error if the terminator or hang banner is empty, or the
    /// read timeout is zero
    pub fn validate(&self) -> CoreResult<()> {
        if self.terminator.is_empty() {
            return Err(CoreError::Validation {
                field: "terminator".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.hang_banner.is_empty() {
            return Err(CoreError::Validation {
                field: "hang_banner".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.read_timeout_ms == 0 {
            return Err(CoreError::Validation {
                field: "read_timeout_ms".to_string(),
                reason: "reads must be bounded by a positive timeout".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::from_markers(&MarkerConfig::default())
    }
}

/// Per-call overrides for `CommandDriver::send_with`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Idle token for subsystems with a different prompt
    pub terminator: Option<String>,
    /// Do not classify error markers as `ErrorMessage`
    pub tolerate_error_markers: bool,
}

impl SendOptions {
    /// Options equivalent to a plain `send`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the terminator
    #[must_use]
    pub fn terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = Some(terminator.into());
        self
    }

    /// Accept responses that legitimately contain error markers
    #[must_use]
    pub fn tolerate_error_markers(mut self) -> Self {
        self.tolerate_error_markers = true;
        self
    }
}
