//! TETHER Core Types
//!
//! This crate contains pure types and logic with no I/O beyond loading
//! configuration. Everything here is shared by the command driver, which
//! writes transcripts, and the replay analyzer, which reads them back.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod line;
pub mod markers;
pub mod outcome;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use line::{LineNumber, TranscriptLine};
pub use markers::{contains_marker, MarkerConfig};
pub use outcome::Classification;
