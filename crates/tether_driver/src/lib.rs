//! TETHER Command Driver
//!
//! Sends one command at a time to a device shell, waits for the idle
//! prompt, classifies the response, and appends it to the transcript.
//! Hangs and error-coded responses are ordinary return values; only link
//! failures surface as errors.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod driver;
pub mod recovery;
pub mod serial;
pub mod shared;

pub use config::{DriverConfig, SendOptions};
pub use connection::{Connection, ConnectionError, ConnectionTarget, StreamConnection};
pub use driver::{CommandDriver, DriverError};
pub use recovery::{RecoveryCoordinator, RecoveryPolicy, SKIP_BANNER};
pub use serial::{SerialConnection, DEFAULT_BAUD_RATE};
pub use shared::SharedDriver;
