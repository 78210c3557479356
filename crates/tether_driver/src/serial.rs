//! Serial device connections.
//!
//! `serialport` is blocking. Each call runs on the blocking pool with the
//! port's own timeout set to a short slice, so a silent device never holds
//! a read past the exchange deadline.

use crate::connection::{find_terminator, Connection, ConnectionError, MAX_DRAIN_BYTES};
use async_trait::async_trait;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::Duration;

/// Line rate used when a target names none
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Longest single blocking read
const POLL_SLICE: Duration = Duration::from_millis(20);

const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

const READ_CHUNK: usize = 512;

/// Connection over a serial port, 8N1
pub struct SerialConnection {
    port: Option<Box<dyn SerialPort>>,
    pending: Vec<u8>,
    label: String,
}

impl std::fmt::Debug for SerialConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialConnection")
            .field("label", &self.label)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialConnection {
    /// Open `path` at `baud_rate`, 8 data bits, no parity, one stop bit.
    ///
    /// Blocks while the port opens; call from a blocking context.
    ///
    /// # Errors
    ///
    /// Returns `Open` if the port cannot be opened or configured
    pub fn open(path: &Path, baud_rate: u32) -> Result<Self, ConnectionError> {
        let label = format!("{}@{}", path.display(), baud_rate);
        let port = serialport::new(path.to_string_lossy(), baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(POLL_SLICE)
            .open()
            .map_err(|e| ConnectionError::Open {
                target: label.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self::new(port, label))
    }

    /// Wrap an already open port
    #[must_use]
    pub fn new(port: Box<dyn SerialPort>, label: impl Into<String>) -> Self {
        Self {
            port: Some(port),
            pending: Vec::new(),
            label: label.into(),
        }
    }

    fn io_err(&self, reason: impl ToString) -> ConnectionError {
        ConnectionError::Io {
            label: self.label.clone(),
            reason: reason.to_string(),
        }
    }

    /// Run `op` against the port on the blocking pool
    async fn blocking<T, F>(&mut self, op: F) -> Result<T, ConnectionError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SerialPort) -> std::io::Result<T> + Send + 'static,
    {
        let Some(mut port) = self.port.take() else {
            return Err(self.io_err("port closed"));
        };
        let joined = tokio::task::spawn_blocking(move || {
            let result = op(port.as_mut());
            (port, result)
        })
        .await;
        match joined {
            Ok((port, result)) => {
                self.port = Some(port);
                result.map_err(|e| self.io_err(e))
            }
            Err(e) => Err(self.io_err(e)),
        }
    }
}

/// One read bounded by `wait`; a timeout yields no bytes
fn read_slice(port: &mut dyn SerialPort, wait: Duration) -> std::io::Result<Vec<u8>> {
    port.set_timeout(wait)?;
    let mut chunk = [0u8; READ_CHUNK];
    match port.read(&mut chunk) {
        Ok(n) => Ok(chunk[..n].to_vec()),
        Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

#[async_trait]
impl Connection for SerialConnection {
    async fn discard_pending(&mut self, window: Duration) -> Result<usize, ConnectionError> {
        let mut discarded = std::mem::take(&mut self.pending).len();
        discarded += self
            .blocking(move |port| {
                let mut dropped = port.bytes_to_read()? as usize;
                port.clear(ClearBuffer::All)?;
                while dropped < MAX_DRAIN_BYTES {
                    let chunk = read_slice(port, window)?;
                    if chunk.is_empty() {
                        break;
                    }
                    dropped += chunk.len();
                }
                Ok(dropped)
            })
            .await?;
        if discarded > 0 {
            tracing::debug!(label = %self.label, discarded, "discarded stale input");
        }
        Ok(discarded)
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        let bytes = bytes.to_vec();
        self.blocking(move |port| {
            port.set_timeout(WRITE_TIMEOUT)?;
            port.write_all(&bytes)?;
            port.flush()
        })
        .await
    }

    async fn read_until(
        &mut self,
        terminator: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, ConnectionError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut buf = std::mem::take(&mut self.pending);
        loop {
            if let Some(end) = find_terminator(&buf, terminator) {
                self.pending = buf.split_off(end);
                return Ok(buf);
            }
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            if left.is_zero() {
                return Ok(buf);
            }
            let wait = left.min(POLL_SLICE);
            let chunk = self.blocking(move |port| read_slice(port, wait)).await?;
            buf.extend_from_slice(&chunk);
        }
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.pending.clear();
        if self.port.take().is_some() {
            tracing::info!(label = %self.label, "closed connection");
        }
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::DriverConfig;
    use crate::driver::CommandDriver;
    use serialport::TTYPort;
    use tether_core::Classification;

    const SHORT: Duration = Duration::from_millis(100);

    fn pty_pair() -> (TTYPort, SerialConnection) {
        let (master, slave) = TTYPort::pair().unwrap();
        (master, SerialConnection::new(Box::new(slave), "pty"))
    }

    #[tokio::test]
    async fn test_read_until_silent_port_times_out() {
        let (_master, mut conn) = pty_pair();
        let read = tokio::time::timeout(Duration::from_secs(2), conn.read_until(b"gsp ]", SHORT))
            .await
            .unwrap()
            .unwrap();
        assert!(read.is_empty());
    }

    #[tokio::test]
    async fn test_read_until_keeps_tail() {
        let (mut master, mut conn) = pty_pair();
        master.write_all(b"PONG\r\ngsp ]tail").unwrap();
        let read = conn
            .read_until(b"gsp ]", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(read, b"PONG\r\ngsp ]");
        let rest = conn.read_until(b"tail", SHORT).await.unwrap();
        assert_eq!(rest, b"tail");
    }

    #[tokio::test]
    async fn test_write_reaches_device() {
        let (mut master, mut conn) = pty_pair();
        conn.write_all(b"cpu_ping\n").await.unwrap();
        master.set_timeout(Duration::from_secs(1)).unwrap();
        let mut seen = [0u8; 9];
        master.read_exact(&mut seen).unwrap();
        assert_eq!(&seen, b"cpu_ping\n");
    }

    #[tokio::test]
    async fn test_discard_pending_drops_stale_output() {
        let (mut master, mut conn) = pty_pair();
        master.write_all(b"boot noise\r\n").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let dropped = conn
            .discard_pending(Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(dropped, 12);
        assert!(conn.read_until(b"\n", SHORT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_port_reports_io() {
        let (_master, mut conn) = pty_pair();
        conn.close().await.unwrap();
        assert!(matches!(
            conn.write_all(b"x").await,
            Err(ConnectionError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_silent_device_send_is_hang() {
        let (_master, conn) = pty_pair();
        let config = DriverConfig::default()
            .with_read_timeout(100)
            .with_inter_command_delay(0)
            .with_drain_window(5);
        let mut driver = CommandDriver::new(Box::new(conn), config).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(3), driver.send("cpu_ping"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Classification::Hang);
    }

    #[tokio::test]
    async fn test_device_reply_is_success() {
        let (mut master, conn) = pty_pair();
        let config = DriverConfig::default()
            .with_read_timeout(1000)
            .with_inter_command_delay(0)
            .with_drain_window(5);
        let mut driver = CommandDriver::new(Box::new(conn), config).unwrap();

        let device = std::thread::spawn(move || {
            master.set_timeout(Duration::from_secs(2)).unwrap();
            let mut seen = Vec::new();
            let mut byte = [0u8; 1];
            while !seen.ends_with(b"\n") {
                master.read_exact(&mut byte).unwrap();
                seen.push(byte[0]);
            }
            master.write_all(b"cpu_ping\r\nPONG\r\ngsp ]").unwrap();
            (seen, master)
        });

        let outcome = driver.send("cpu_ping").await.unwrap();
        let (seen, _master) = device.join().unwrap();
        assert_eq!(seen, b"cpu_ping\n");
        assert_eq!(outcome, Classification::Success);
    }
}
