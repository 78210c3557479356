//! The command driver.
//!
//! One `send` is one exchange: drain stale input, write the command, read
//! until the prompt, nudge once if the prompt did not come back, classify,
//! and append exactly one transcript entry.

use crate::config::{DriverConfig, SendOptions};
use crate::connection::{Connection, ConnectionError, ConnectionTarget};
use std::path::PathBuf;
use std::time::Duration;
use tether_core::{contains_marker, Classification, CoreError};
use tether_log::{LogConfig, Severity, TranscriptError, TranscriptLog};

/// Driver errors. Protocol outcomes are never errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// The link failed or could not be opened
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The transcript could not be written
    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    /// The command cannot be sent
    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },

    /// Reconnect requested on a driver built from a bare connection
    #[error("No connection target to reopen")]
    NoTarget,

    /// Configuration rejected
    #[error("Invalid driver configuration: {0}")]
    Config(String),
}

impl From<DriverError> for CoreError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Transcript(inner) => inner.into(),
            other => CoreError::Validation {
                field: "driver".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Drives one device shell over one connection
pub struct CommandDriver {
    connection: Box<dyn Connection>,
    target: Option<ConnectionTarget>,
    config: DriverConfig,
    transcript: TranscriptLog,
}

impl CommandDriver {
    /// Create a driver over an already open connection
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(connection: Box<dyn Connection>, config: DriverConfig) -> Result<Self, DriverError> {
        config
            .validate()
            .map_err(|e| DriverError::Config(e.to_string()))?;
        Ok(Self {
            connection,
            target: None,
            config,
            transcript: TranscriptLog::new(),
        })
    }

    /// Open `target` and create a driver over it
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the target cannot
    /// be opened
    pub async fn connect(target: ConnectionTarget, config: DriverConfig) -> Result<Self, DriverError> {
        let connection = target.open().await?;
        let mut driver = Self::new(connection, config)?;
        driver.target = Some(target);
        Ok(driver)
    }

    /// Send `command` with the default terminator
    ///
    /// # Errors
    ///
    /// Returns error only if the link or transcript fails
    pub async fn send(&mut self, command: &str) -> Result<Classification, DriverError> {
        self.send_with(command, &SendOptions::default()).await
    }

    /// Send `command` with per-call overrides
    ///
    /// # Errors
    ///
    /// Returns error if the command or the terminator override is empty,
    /// or the link or transcript fails
    pub async fn send_with(
        &mut self,
        command: &str,
        options: &SendOptions,
    ) -> Result<Classification, DriverError> {
        if command.is_empty() {
            return Err(DriverError::InvalidCommand {
                reason: "command must not be empty".to_string(),
            });
        }
        let terminator = self.terminator_for(options)?;

        self.connection
            .discard_pending(self.config.drain_window())
            .await?;
        self.connection.write_all(&frame_command(command)).await?;
        tracing::debug!(command, "sent");

        self.complete_exchange(command, &terminator, options.tolerate_error_markers)
            .await
    }

    /// Start a long-running service on the device.
    ///
    /// Writes `command`, waits `settle`, nudges the shell, then classifies
    /// the prompt that follows like `send`.
    ///
    /// # Errors
    ///
    /// Returns error if the command is empty, or the link or transcript fails
    pub async fn launch(&mut self, command: &str, settle: Duration) -> Result<Classification, DriverError> {
        if command.is_empty() {
            return Err(DriverError::InvalidCommand {
                reason: "command must not be empty".to_string(),
            });
        }
        let terminator = self.config.terminator.as_bytes().to_vec();
        self.connection.write_all(&frame_command(command)).await?;
        tokio::time::sleep(settle).await;
        self.connection.write_all(b"\n").await?;
        self.complete_exchange(command, &terminator, false).await
    }

    /// Write `command` to a shell with idle token `terminator`, read up to
    /// `reads` prompts, and log the concatenated output unclassified.
    ///
    /// # Errors
    ///
    /// Returns error if `terminator` is empty, or the link or transcript fails
    pub async fn capture(
        &mut self,
        command: &str,
        terminator: &str,
        reads: usize,
    ) -> Result<String, DriverError> {
        if terminator.is_empty() {
            return Err(empty_terminator());
        }
        self.connection.write_all(&frame_command(command)).await?;
        let mut response = Vec::new();
        for _ in 0..reads {
            let chunk = self
                .connection
                .read_until(terminator.as_bytes(), self.config.read_timeout())
                .await?;
            response.extend_from_slice(&chunk);
        }
        let text = String::from_utf8_lossy(&response).trim_end().to_string();
        self.transcript.record_exchange(&text)?;
        Ok(text)
    }

    async fn complete_exchange(
        &mut self,
        command: &str,
        terminator: &[u8],
        tolerate_error_markers: bool,
    ) -> Result<Classification, DriverError> {
        let timeout = self.config.read_timeout();
        let mut response = self.connection.read_until(terminator, timeout).await?;

        if !response.ends_with(terminator) {
            tracing::debug!(command, "prompt not seen, nudging");
            self.connection.write_all(b"\n").await?;
            let retry = self.connection.read_until(terminator, timeout).await?;
            response.extend_from_slice(&retry);
            if !retry.ends_with(terminator) {
                let entry = hang_entry(&decode(&response), &self.config.hang_banner);
                self.transcript.record_exchange(&entry)?;
                tracing::warn!(command, "no prompt after nudge");
                return Ok(Classification::Hang);
            }
        }

        let flagged = contains_marker(&response, &self.config.error_markers);
        let classification = if !tolerate_error_markers && flagged {
            Classification::ErrorMessage
        } else {
            Classification::Success
        };
        self.transcript.record_exchange(&decode(&response))?;
        tokio::time::sleep(self.config.inter_command_delay()).await;
        Ok(classification)
    }

    fn terminator_for(&self, options: &SendOptions) -> Result<Vec<u8>, DriverError> {
        match options.terminator.as_deref() {
            Some("") => Err(empty_terminator()),
            Some(terminator) => Ok(terminator.as_bytes().to_vec()),
            None => Ok(self.config.terminator.as_bytes().to_vec()),
        }
    }

    /// Open a transcript; a no-op warning if one is already open
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created
    pub fn start_transcript(&mut self, config: &LogConfig) -> Result<PathBuf, DriverError> {
        Ok(self.transcript.start(config)?)
    }

    /// Suppress transcript notes below `Critical`
    pub fn pause_transcript(&mut self) {
        self.transcript.pause();
    }

    /// Undo `pause_transcript`
    pub fn resume_transcript(&mut self) {
        self.transcript.resume();
    }

    /// Close the transcript file
    pub fn stop_transcript(&mut self) {
        self.transcript.stop();
    }

    /// Mirror transcript entries to tracing
    pub fn set_echo(&mut self, echo: bool) {
        self.transcript.set_echo(echo);
    }

    /// Write a free-form note to the transcript
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn note(&mut self, severity: Severity, message: &str) -> Result<bool, DriverError> {
        Ok(self.transcript.note(severity, message)?)
    }

    /// The transcript
    #[must_use]
    pub fn transcript(&self) -> &TranscriptLog {
        &self.transcript
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Target this driver was opened from
    #[must_use]
    pub fn target(&self) -> Option<&ConnectionTarget> {
        self.target.as_ref()
    }

    /// Swap in a fresh connection, dropping the old one
    pub fn reinitialize(&mut self, connection: Box<dyn Connection>) {
        tracing::info!(old = %self.connection.label(), new = %connection.label(), "connection replaced");
        self.connection = connection;
    }

    /// Close the link and reopen it from the stored target
    ///
    /// # Errors
    ///
    /// Returns `NoTarget` if the driver was built from a bare connection,
    /// or the open error
    pub async fn reconnect(&mut self) -> Result<(), DriverError> {
        let target = self.target.clone().ok_or(DriverError::NoTarget)?;
        if let Err(e) = self.connection.close().await {
            tracing::warn!(error = %e, "close before reconnect failed");
        }
        let connection = target.open().await?;
        self.reinitialize(connection);
        Ok(())
    }

    /// Shut the link down
    ///
    /// # Errors
    ///
    /// Returns error if shutdown fails
    pub async fn close(&mut self) -> Result<(), DriverError> {
        self.connection.close().await?;
        Ok(())
    }
}

impl std::fmt::Debug for CommandDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDriver")
            .field("connection", &self.connection.label())
            .field("target", &self.target)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn empty_terminator() -> DriverError {
    DriverError::InvalidCommand {
        reason: "terminator must not be empty".to_string(),
    }
}

/// Append a newline unless the payload already starts or ends with one
fn frame_command(command: &str) -> Vec<u8> {
    let mut bytes = command.as_bytes().to_vec();
    if !command.starts_with('\n') && !command.ends_with('\n') {
        bytes.push(b'\n');
    }
    bytes
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

fn hang_entry(partial: &str, banner: &str) -> String {
    if partial.is_empty() {
        banner.to_string()
    } else {
        format!("{}\n{}", partial, banner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::StreamConnection;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn test_config() -> DriverConfig {
        DriverConfig::default()
            .with_read_timeout(100)
            .with_inter_command_delay(0)
            .with_drain_window(5)
    }

    fn driver_pair() -> (CommandDriver, DuplexStream) {
        let (client, device) = duplex(4096);
        let conn = Box::new(StreamConnection::new(client, "test"));
        (CommandDriver::new(conn, test_config()).unwrap(), device)
    }

    async fn read_line(device: &mut DuplexStream) -> String {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while device.read_exact(&mut byte).await.is_ok() {
            line.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }
        String::from_utf8_lossy(&line).to_string()
    }

    fn transcript_text(driver: &CommandDriver) -> String {
        std::fs::read_to_string(driver.transcript().path().unwrap()).unwrap()
    }

    #[test]
    fn test_frame_command() {
        assert_eq!(frame_command("cpu_ping"), b"cpu_ping\n");
        assert_eq!(frame_command("cpu_ping\n"), b"cpu_ping\n");
        assert_eq!(frame_command("\nraw"), b"\nraw");
    }

    #[test]
    fn test_hang_entry() {
        assert_eq!(hang_entry("", "--H--"), "--H--");
        assert_eq!(hang_entry("busy", "--H--"), "busy\n--H--");
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let (client, _device) = duplex(64);
        let conn = Box::new(StreamConnection::new(client, "test"));
        let err = CommandDriver::new(conn, test_config().with_terminator("")).unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));
    }

    #[tokio::test]
    async fn test_send_success() {
        let (mut driver, mut device) = driver_pair();
        let dir = tempfile::tempdir().unwrap();
        driver
            .start_transcript(&LogConfig::new(dir.path()).with_name("run"))
            .unwrap();

        let device_task = tokio::spawn(async move {
            let line = read_line(&mut device).await;
            device.write_all(b"gsp ] cpu_ping\r\nPONG\r\ngsp ]").await.unwrap();
            (line, device)
        });

        let result = driver.send("cpu_ping").await.unwrap();
        let (line, _device) = device_task.await.unwrap();
        assert_eq!(result, Classification::Success);
        assert_eq!(line, "cpu_ping\n");
        let text = transcript_text(&driver);
        assert!(text.contains("PONG"));
        assert_eq!(driver.transcript().entries_written(), 1);
    }

    #[tokio::test]
    async fn test_send_error_message() {
        let (mut driver, mut device) = driver_pair();
        let device_task = tokio::spawn(async move {
            read_line(&mut device).await;
            device.write_all(b"\x1b[31mFAIL\x1b[0m\r\ngsp ]").await.unwrap();
            device
        });
        let result = driver.send("google_tests -n bad").await.unwrap();
        let _device = device_task.await.unwrap();
        assert_eq!(result, Classification::ErrorMessage);
    }

    #[tokio::test]
    async fn test_send_tolerates_error_markers() {
        let (mut driver, mut device) = driver_pair();
        let device_task = tokio::spawn(async move {
            read_line(&mut device).await;
            device.write_all(b"\x1b[91mcolour test\x1b[0m\r\ngsp ]").await.unwrap();
            device
        });
        let options = SendOptions::new().tolerate_error_markers();
        let result = driver.send_with("colour_test", &options).await.unwrap();
        let _device = device_task.await.unwrap();
        assert_eq!(result, Classification::Success);
    }

    #[tokio::test]
    async fn test_send_hang_logs_partial_and_banner() {
        let (mut driver, mut device) = driver_pair();
        let dir = tempfile::tempdir().unwrap();
        driver
            .start_transcript(&LogConfig::new(dir.path()).with_name("hang"))
            .unwrap();

        let device_task = tokio::spawn(async move {
            read_line(&mut device).await;
            device.write_all(b"partial output").await.unwrap();
            let nudge = read_line(&mut device).await;
            (nudge, device)
        });

        let result = driver.send("google_tests -n stuck").await.unwrap();
        let (nudge, _device) = device_task.await.unwrap();
        assert_eq!(result, Classification::Hang);
        assert_eq!(nudge, "\n");
        assert_eq!(transcript_text(&driver), "partial output\n--------Hang--------\n");
        assert_eq!(driver.transcript().entries_written(), 1);
    }

    #[tokio::test]
    async fn test_nudge_recovers_prompt() {
        let (mut driver, mut device) = driver_pair();
        let device_task = tokio::spawn(async move {
            read_line(&mut device).await;
            device.write_all(b"still working").await.unwrap();
            read_line(&mut device).await;
            device.write_all(b"\r\ndone\r\ngsp ]").await.unwrap();
            device
        });
        let result = driver.send("slow_cmd").await.unwrap();
        let _device = device_task.await.unwrap();
        assert_eq!(result, Classification::Success);
    }

    #[tokio::test]
    async fn test_custom_terminator() {
        let (mut driver, mut device) = driver_pair();
        let device_task = tokio::spawn(async move {
            read_line(&mut device).await;
            device.write_all(b"sensor ok\r\ne24]").await.unwrap();
            device
        });
        let options = SendOptions::new().terminator("e24]");
        let result = driver.send_with("sensor_status", &options).await.unwrap();
        let _device = device_task.await.unwrap();
        assert_eq!(result, Classification::Success);
    }

    #[tokio::test]
    async fn test_stale_input_discarded() {
        let (mut driver, mut device) = driver_pair();
        device.write_all(b"old prompt gsp ]").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        driver
            .start_transcript(&LogConfig::new(dir.path()).with_name("stale"))
            .unwrap();

        let device_task = tokio::spawn(async move {
            read_line(&mut device).await;
            device.write_all(b"fresh\r\ngsp ]").await.unwrap();
            device
        });
        let result = driver.send("cpu_ping").await.unwrap();
        let _device = device_task.await.unwrap();
        assert_eq!(result, Classification::Success);
        let text = transcript_text(&driver);
        assert!(text.contains("fresh"));
        assert!(!text.contains("old prompt"));
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let (mut driver, _device) = driver_pair();
        let err = driver.send("").await.unwrap_err();
        assert!(matches!(err, DriverError::InvalidCommand { .. }));
    }

    #[tokio::test]
    async fn test_empty_terminator_override_rejected() {
        let (mut driver, mut device) = driver_pair();
        let options = SendOptions::new().terminator("");
        let err = driver.send_with("cpu_ping", &options).await.unwrap_err();
        assert!(matches!(err, DriverError::InvalidCommand { .. }));

        let err = driver.capture("read_temp", "", 1).await.unwrap_err();
        assert!(matches!(err, DriverError::InvalidCommand { .. }));

        let mut byte = [0u8; 1];
        let written =
            tokio::time::timeout(Duration::from_millis(50), device.read(&mut byte)).await;
        assert!(written.is_err(), "nothing may reach the device");
    }

    #[tokio::test]
    async fn test_paused_transcript_still_records_exchanges() {
        let (mut driver, mut device) = driver_pair();
        let dir = tempfile::tempdir().unwrap();
        driver
            .start_transcript(&LogConfig::new(dir.path()).with_name("paused"))
            .unwrap();
        driver.pause_transcript();
        assert!(!driver.note(Severity::Info, "suppressed").unwrap());

        let device_task = tokio::spawn(async move {
            read_line(&mut device).await;
            device.write_all(b"PONG\r\ngsp ]").await.unwrap();
            device
        });
        driver.send("cpu_ping").await.unwrap();
        let _device = device_task.await.unwrap();
        driver.resume_transcript();

        let text = transcript_text(&driver);
        assert!(text.contains("PONG"));
        assert!(!text.contains("suppressed"));
    }

    #[tokio::test]
    async fn test_launch_nudges_after_settle() {
        let (mut driver, mut device) = driver_pair();
        let device_task = tokio::spawn(async move {
            let command = read_line(&mut device).await;
            let nudge = read_line(&mut device).await;
            device.write_all(b"fastboot ready\r\ngsp ]").await.unwrap();
            (command, nudge, device)
        });
        let result = driver
            .launch("google_tests -n fastboot_start -a 2", Duration::from_millis(10))
            .await
            .unwrap();
        let (command, nudge, _device) = device_task.await.unwrap();
        assert_eq!(result, Classification::Success);
        assert_eq!(command, "google_tests -n fastboot_start -a 2\n");
        assert_eq!(nudge, "\n");
    }

    #[tokio::test]
    async fn test_capture_reads_multiple_prompts() {
        let (mut driver, mut device) = driver_pair();
        let device_task = tokio::spawn(async move {
            read_line(&mut device).await;
            device.write_all(b"e24]\r\ntemp=41C\r\ne24]").await.unwrap();
            device
        });
        let text = driver.capture("read_temp", "e24]", 2).await.unwrap();
        let _device = device_task.await.unwrap();
        assert_eq!(text, "e24]\r\ntemp=41C\r\ne24]");
    }

    #[tokio::test]
    async fn test_reconnect_without_target() {
        let (mut driver, _device) = driver_pair();
        assert_eq!(driver.reconnect().await, Err(DriverError::NoTarget));
    }

    #[tokio::test]
    async fn test_reinitialize_swaps_connection() {
        let (mut driver, _old) = driver_pair();
        let (client, mut device) = duplex(1024);
        driver.reinitialize(Box::new(StreamConnection::new(client, "fresh")));
        let device_task = tokio::spawn(async move {
            read_line(&mut device).await;
            device.write_all(b"gsp ]").await.unwrap();
            device
        });
        assert_eq!(driver.send("cpu_ping").await.unwrap(), Classification::Success);
        let _device = device_task.await.unwrap();
    }
}
