//! TETHER Replay
//!
//! Reconstructs per-command test statistics from a persisted transcript.
//! The analyzer has no live connection, only text: it recognizes configured
//! markers in a single forward pass with one line of pushback, and the
//! renderer turns the result into the fixed-format summary report.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analyzer;
pub mod classify;
pub mod error;
pub mod result;
pub mod stats;
pub mod summary;

pub use analyzer::Analyzer;
pub use classify::{LineTag, MarkerTable};
pub use error::ReplayError;
pub use result::{ResultLine, ResultMatcher};
pub use stats::{AnalysisResult, CommandHangTally, Occurrence, TestStats};
pub use summary::{summary_path, write_summary, AggregateLine, SummaryRenderer};
