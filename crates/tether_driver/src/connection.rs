//! Byte-stream connections to a device shell.
//!
//! A connection is anything that can drop stale input, write bytes, and
//! read until a terminator within a deadline. `StreamConnection` adapts any
//! tokio stream, such as a TCP serial bridge. Serial devices go through
//! [`SerialConnection`](crate::serial::SerialConnection).

use crate::serial::{SerialConnection, DEFAULT_BAUD_RATE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on bytes discarded by one drain
pub(crate) const MAX_DRAIN_BYTES: usize = 1 << 20;

const READ_CHUNK: usize = 512;

/// Connection errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// The connection could not be opened
    #[error("Failed to open {target}: {reason}")]
    Open { target: String, reason: String },

    /// The link failed mid-exchange
    #[error("I/O error on {label}: {reason}")]
    Io { label: String, reason: String },

    /// Target string could not be parsed
    #[error("Invalid connection target: {0}")]
    InvalidTarget(String),
}

/// Where a device shell is reachable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionTarget {
    /// Serial device node, opened 8N1
    Device {
        /// Device path
        path: PathBuf,
        /// Line rate
        baud_rate: u32,
    },
    /// TCP bridge in `host:port` form
    Tcp(String),
}

impl ConnectionTarget {
    /// A serial device at the default baud rate
    #[must_use]
    pub fn device(path: impl Into<PathBuf>) -> Self {
        Self::Device {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }

    /// Open the target
    ///
    /// # Errors
    ///
    /// Returns `Open` if the device or socket cannot be opened
    pub async fn open(&self) -> Result<Box<dyn Connection>, ConnectionError> {
        let label = self.to_string();
        let open_err = |e: std::io::Error| ConnectionError::Open {
            target: label.clone(),
            reason: e.to_string(),
        };
        let connection: Box<dyn Connection> = match self {
            Self::Device { path, baud_rate } => {
                let (path, baud_rate) = (path.clone(), *baud_rate);
                let port = tokio::task::spawn_blocking(move || {
                    SerialConnection::open(&path, baud_rate)
                })
                .await
                .map_err(|e| ConnectionError::Open {
                    target: label.clone(),
                    reason: e.to_string(),
                })??;
                Box::new(port)
            }
            Self::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str())
                    .await
                    .map_err(open_err)?;
                Box::new(StreamConnection::new(stream, label.clone()))
            }
        };
        tracing::info!(link = %label, "opened connection");
        Ok(connection)
    }
}

impl FromStr for ConnectionTarget {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConnectionError::InvalidTarget("empty target".to_string()));
        }
        match s.strip_prefix("tcp://") {
            Some("") => Err(ConnectionError::InvalidTarget(s.to_string())),
            Some(addr) => Ok(Self::Tcp(addr.to_string())),
            None => match s.rsplit_once('@') {
                Some((path, baud)) if !path.is_empty() => match baud.parse::<u32>() {
                    Ok(0) => Err(ConnectionError::InvalidTarget(s.to_string())),
                    Ok(baud_rate) => Ok(Self::Device {
                        path: PathBuf::from(path),
                        baud_rate,
                    }),
                    Err(_) => Ok(Self::device(s)),
                },
                _ => Ok(Self::device(s)),
            },
        }
    }
}

impl std::fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device { path, baud_rate } => write!(f, "{}@{}", path.display(), baud_rate),
            Self::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// A byte-stream link to one device shell.
///
/// Not safe for concurrent exchanges; wrap the driver in a `SharedDriver`
/// when several tasks need it.
#[async_trait]
pub trait Connection: Send {
    /// Drop buffered input, waiting at most `window` of silence per read.
    ///
    /// Returns the number of bytes discarded.
    async fn discard_pending(&mut self, window: Duration) -> Result<usize, ConnectionError>;

    /// Write all bytes and flush
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), ConnectionError>;

    /// Read until `terminator` has been received or `timeout` elapses.
    ///
    /// Returns everything read up to and including the terminator, or the
    /// partial data on timeout or end of stream. Bytes past the terminator
    /// are kept for the next read.
    async fn read_until(
        &mut self,
        terminator: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, ConnectionError>;

    /// Shut the link down
    async fn close(&mut self) -> Result<(), ConnectionError>;

    /// Human-readable name of the link
    fn label(&self) -> &str;
}

/// Connection over any tokio byte stream
#[derive(Debug)]
pub struct StreamConnection<S> {
    stream: S,
    pending: Vec<u8>,
    label: String,
}

impl<S> StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a stream
    #[must_use]
    pub fn new(stream: S, label: impl Into<String>) -> Self {
        Self {
            stream,
            pending: Vec::new(),
            label: label.into(),
        }
    }

    fn io_err(&self, e: std::io::Error) -> ConnectionError {
        ConnectionError::Io {
            label: self.label.clone(),
            reason: e.to_string(),
        }
    }
}

/// Offset just past the first occurrence of `terminator` in `haystack`
pub(crate) fn find_terminator(haystack: &[u8], terminator: &[u8]) -> Option<usize> {
    if terminator.is_empty() || haystack.len() < terminator.len() {
        return None;
    }
    haystack
        .windows(terminator.len())
        .position(|w| w == terminator)
        .map(|i| i + terminator.len())
}

#[async_trait]
impl<S> Connection for StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn discard_pending(&mut self, window: Duration) -> Result<usize, ConnectionError> {
        let mut discarded = std::mem::take(&mut self.pending).len();
        let mut chunk = [0u8; READ_CHUNK];
        while discarded < MAX_DRAIN_BYTES {
            match tokio::time::timeout(window, self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => discarded += n,
                Ok(Err(e)) => return Err(self.io_err(e)),
            }
        }
        if discarded > 0 {
            tracing::debug!(label = %self.label, discarded, "discarded stale input");
        }
        Ok(discarded)
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        if let Err(e) = self.stream.write_all(bytes).await {
            return Err(self.io_err(e));
        }
        if let Err(e) = self.stream.flush().await {
            return Err(self.io_err(e));
        }
        Ok(())
    }

    async fn read_until(
        &mut self,
        terminator: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, ConnectionError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut buf = std::mem::take(&mut self.pending);
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(end) = find_terminator(&buf, terminator) {
                self.pending = buf.split_off(end);
                return Ok(buf);
            }
            match tokio::time::timeout_at(deadline, self.stream.read(&mut chunk)).await {
                Err(_) | Ok(Ok(0)) => return Ok(buf),
                Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(self.io_err(e)),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.pending.clear();
        if let Err(e) = self.stream.shutdown().await {
            return Err(self.io_err(e));
        }
        tracing::info!(label = %self.label, "closed connection");
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}
