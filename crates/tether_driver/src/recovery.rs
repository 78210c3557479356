//! Hang recovery hooks.
//!
//! The driver never retries beyond its single nudge. A caller that wants
//! to keep going after a hang reopens the link here: the coordinator
//! reconnects from the driver's stored target and resumes the transcript.
//! It never resends the command.

use crate::driver::{CommandDriver, DriverError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tether_core::Classification;
use tether_log::Severity;

/// Note written to the transcript once the link is back
pub const SKIP_BANNER: &str = "-------------Skipping to next reboot-------------";

/// How hard to try reopening the link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    /// Reconnect attempts per hang
    pub max_reconnects: u32,
    /// Wait after a successful reconnect, in milliseconds
    pub settle_ms: u64,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_reconnects: 1,
            settle_ms: 3000,
        }
    }
}

/// Reopens a driver's link after a hang
#[derive(Debug, Clone, Default)]
pub struct RecoveryCoordinator {
    policy: RecoveryPolicy,
    recoveries: u32,
}

impl RecoveryCoordinator {
    /// Create a coordinator
    #[must_use]
    pub fn new(policy: RecoveryPolicy) -> Self {
        Self {
            policy,
            recoveries: 0,
        }
    }

    /// Successful recoveries so far
    #[must_use]
    pub fn recoveries(&self) -> u32 {
        self.recoveries
    }

    /// Send `command`; on a hang, recover the link before returning.
    ///
    /// The classification is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange fails or every reconnect attempt fails
    pub async fn send(
        &mut self,
        driver: &mut CommandDriver,
        command: &str,
    ) -> Result<Classification, DriverError> {
        let classification = driver.send(command).await?;
        if classification.needs_recovery() {
            self.recover(driver).await?;
        }
        Ok(classification)
    }

    /// Reconnect `driver`, resume its transcript, and mark the skip in it
    ///
    /// # Errors
    ///
    /// Returns the last reconnect error if every attempt fails
    pub async fn recover(&mut self, driver: &mut CommandDriver) -> Result<(), DriverError> {
        let attempts = self.policy.max_reconnects.max(1);
        let mut last_err = DriverError::NoTarget;
        for attempt in 1..=attempts {
            match driver.reconnect().await {
                Ok(()) => {
                    tokio::time::sleep(Duration::from_millis(self.policy.settle_ms)).await;
                    if driver.transcript().is_paused() {
                        driver.resume_transcript();
                    }
                    driver.note(Severity::Info, SKIP_BANNER)?;
                    self.recoveries += 1;
                    tracing::info!(attempt, "link recovered");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "reconnect failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}
