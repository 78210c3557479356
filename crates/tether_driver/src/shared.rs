//! Serialized access to one driver from several tasks.

use crate::config::SendOptions;
use crate::driver::{CommandDriver, DriverError};
use std::sync::Arc;
use tether_core::Classification;
use tokio::sync::{Mutex, MutexGuard};

/// Cloneable handle to a driver.
///
/// The mutex is mandatory: exchanges on one connection must never
/// interleave, so every call holds the lock for the whole exchange.
#[derive(Debug, Clone)]
pub struct SharedDriver {
    inner: Arc<Mutex<CommandDriver>>,
}

impl SharedDriver {
    /// Wrap a driver
    #[must_use]
    pub fn new(driver: CommandDriver) -> Self {
        Self {
            inner: Arc::new(Mutex::new(driver)),
        }
    }

    /// Send under the lock
    ///
    /// # Errors
    ///
    /// Returns error if the link or transcript fails
    pub async fn send(&self, command: &str) -> Result<Classification, DriverError> {
        self.inner.lock().await.send(command).await
    }

    /// Send with overrides under the lock
    ///
    /// # Errors
    ///
    /// Returns error if the command is empty, or the link or transcript fails
    pub async fn send_with(
        &self,
        command: &str,
        options: &SendOptions,
    ) -> Result<Classification, DriverError> {
        self.inner.lock().await.send_with(command, options).await
    }

    /// Hold the driver for a sequence of exchanges
    pub async fn lock(&self) -> MutexGuard<'_, CommandDriver> {
        self.inner.lock().await
    }
}
