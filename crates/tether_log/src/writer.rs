//! Append-only transcript writer.
//!
//! One call appends one entry. Multi-line entries get the configured prefix
//! on every line so the file stays readable line by line.

use crate::source::TranscriptError;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Severity of a transcript note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Debug detail
    Debug,
    /// Normal output
    Info,
    /// Something looks off
    Warning,
    /// Something failed
    Error,
    /// Always written, even while paused
    Critical,
}

/// Where and how a transcript is written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory holding transcript files
    pub dir: PathBuf,
    /// File stem; a `%Y%m%d_%H%M%S` timestamp when absent
    pub name: Option<String>,
    /// Text placed before every line of every entry
    pub prefix: String,
    /// Mirror entries to tracing
    pub echo: bool,
}

impl LogConfig {
    /// Create a config writing into `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            name: None,
            prefix: String::new(),
            echo: false,
        }
    }

    /// Set the file stem
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the line prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Enable echo to tracing
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Path of the transcript file this config resolves to
    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        let stem = match &self.name {
            Some(name) => name.clone(),
            None => chrono::Local::now().format("%Y%m%d_%H%M%S").to_string(),
        };
        self.dir.join(format!("{}.log", stem))
    }
}

/// Append-only transcript file with a pause gate
#[derive(Debug)]
pub struct TranscriptLog {
    file: Option<(PathBuf, File)>,
    prefix: String,
    threshold: Severity,
    paused_from: Option<Severity>,
    echo: bool,
    entries_written: u64,
}

impl TranscriptLog {
    /// Create a log with no file attached
    #[must_use]
    pub fn new() -> Self {
        Self {
            file: None,
            prefix: String::new(),
            threshold: Severity::Info,
            paused_from: None,
            echo: false,
            entries_written: 0,
        }
    }

    /// Open the transcript file described by `config` in append mode.
    ///
    /// If a file is already open it is kept and its path returned.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created
    pub fn start(&mut self, config: &LogConfig) -> Result<PathBuf, TranscriptError> {
        self.echo = config.echo;
        if let Some((path, _)) = &self.file {
            tracing::warn!(path = %path.display(), "transcript already open, keeping it");
            return Ok(path.clone());
        }

        let path = config.file_path();
        let io_err = |e: std::io::Error| TranscriptError::Io {
            path: path.clone(),
            reason: e.to_string(),
        };
        std::fs::create_dir_all(&config.dir).map_err(io_err)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        tracing::info!(path = %path.display(), "transcript started");
        self.prefix = config.prefix.clone();
        self.file = Some((path.clone(), file));
        Ok(path)
    }

    /// Close the transcript file
    pub fn stop(&mut self) {
        if let Some((path, _)) = self.file.take() {
            tracing::info!(path = %path.display(), "transcript stopped");
        }
        self.paused_from = None;
    }

    /// Suppress notes below `Critical` until `resume`
    pub fn pause(&mut self) {
        if self.file.is_none() {
            tracing::warn!("transcript not active, nothing to pause");
            return;
        }
        if self.paused_from.is_none() {
            self.paused_from = Some(self.threshold);
            self.threshold = Severity::Critical;
        }
    }

    /// Restore the threshold saved by `pause`
    pub fn resume(&mut self) {
        match self.paused_from.take() {
            Some(previous) => self.threshold = previous,
            None => tracing::warn!("transcript not paused or active, nothing to resume"),
        }
    }

    /// Turn echo to tracing on or off
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Whether a file is attached
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.file.is_some()
    }

    /// Whether notes are currently suppressed
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused_from.is_some()
    }

    /// Path of the open transcript
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }

    /// Entries written since creation
    #[must_use]
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Append a note if `severity` passes the current threshold.
    ///
    /// Returns whether the note reached the file.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn note(&mut self, severity: Severity, message: &str) -> Result<bool, TranscriptError> {
        if severity < self.threshold {
            return Ok(false);
        }
        self.append(message)
    }

    /// Append the raw response of one exchange.
    ///
    /// Exchanges are written while paused; only notes are gated.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn record_exchange(&mut self, response: &str) -> Result<bool, TranscriptError> {
        self.append(response)
    }

    fn append(&mut self, message: &str) -> Result<bool, TranscriptError> {
        if self.echo {
            tracing::info!(target: "tether::transcript", "{}", message);
        }
        let Some((path, file)) = self.file.as_mut() else {
            return Ok(false);
        };
        let entry = format_entry(&self.prefix, message);
        file.write_all(entry.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| TranscriptError::Io {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        self.entries_written += 1;
        Ok(true)
    }
}

impl Default for TranscriptLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Render one entry: every line carries `prefix`, the entry ends with a newline
#[must_use]
pub fn format_entry(prefix: &str, message: &str) -> String {
    let mut out = String::with_capacity(message.len() + prefix.len() + 1);
    let mut lines = message.lines().peekable();
    if lines.peek().is_none() {
        out.push_str(prefix);
        out.push('\n');
        return out;
    }
    for line in lines {
        out.push_str(prefix);
        out.push_str(line);
        out.push('\n');
    }
    out
}
