//! TETHER Transcript Log
//!
//! The transcript is the only interface between the command driver and the
//! analyzer. This crate writes it (append-only, one entry per exchange) and
//! reads it back as numbered lines behind a cursor with one line of pushback.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod source;
pub mod writer;

pub use cursor::{CursorError, LineCursor};
pub use source::{read_transcript, TranscriptError};
pub use writer::{LogConfig, Severity, TranscriptLog};
