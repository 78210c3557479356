//! Summary report.
//!
//! The report layout is consumed by downstream aggregation tooling, which
//! finds the aggregate line with its own regular expression. Changing any
//! literal here breaks those consumers.

use crate::error::ReplayError;
use crate::stats::AnalysisResult;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tether_log::{LogConfig, Severity, TranscriptLog};

/// First line of every report
pub const SUMMARY_HEADER: &str = "----------------------- Test Summary -----------------------";

/// Written instead of a report when analysis failed
pub const ANALYSIS_FAILED: &str = "Analysis could not be completed.";

const TIMEOUT_WARNING: &str =
    "\nWARNING: One or more tests may have timed out (result summary not found).";

static AGGREGATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d+)\s+Tests\s+(\d+)\s+Fails\s+(\d+)\s+Ignored\s+(\d+)\s+Hangs\s+(\d+)\s+Error\s+Messages",
    )
    .expect("aggregate pattern is valid")
});

/// Renders an [`AnalysisResult`] as the fixed-format report
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryRenderer;

impl SummaryRenderer {
    /// Report entries with the severity each is logged at
    pub fn entries(result: &AnalysisResult) -> Vec<(Severity, String)> {
        let mut out = vec![
            (Severity::Info, SUMMARY_HEADER.to_string()),
            (Severity::Info, format!("Total iterations: {}", result.iterations)),
            (Severity::Info, AggregateLine::from_result(result).to_string()),
        ];
        if result.timeout_flag {
            out.push((Severity::Warning, TIMEOUT_WARNING.to_string()));
        }
        if result.is_clean() {
            out.push((Severity::Info, "\nPASSED".to_string()));
            return out;
        }

        let mut section = |title: &str, lines: Vec<String>| {
            out.push((Severity::Info, format!("\n--- {title} ---")));
            if lines.is_empty() {
                out.push((Severity::Info, "None".to_string()));
            }
            out.extend(lines.into_iter().map(|line| (Severity::Info, line)));
        };

        let tests = &result.test_stats;
        section(
            "Failed tests",
            tests
                .iter()
                .flat_map(|(key, stats)| {
                    stats.failures.iter().map(move |o| {
                        format!("'{key}': {} failure(s) found on line {}", o.count, o.line)
                    })
                })
                .collect(),
        );
        section(
            "Ignored tests",
            tests
                .iter()
                .flat_map(|(key, stats)| {
                    stats.ignored.iter().map(move |o| {
                        format!("'{key}': {} ignored found on line {}", o.count, o.line)
                    })
                })
                .collect(),
        );
        section(
            "Hanged tests",
            tests
                .iter()
                .flat_map(|(key, stats)| {
                    stats
                        .hangs
                        .iter()
                        .map(move |o| format!("'{key}': {} hangs found on line {}", o.count, o.line))
                })
                .collect(),
        );
        section(
            "Hanged commands",
            result
                .command_hangs
                .lines
                .iter()
                .map(|line| format!("1 hang found on line {line}"))
                .collect(),
        );
        out
    }

    /// The full report as text
    pub fn render(result: &AnalysisResult) -> String {
        Self::entries(result)
            .into_iter()
            .map(|(_, line)| line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text written when analysis failed
    pub fn render_failure() -> &'static str {
        ANALYSIS_FAILED
    }
}

/// Path of the summary file for a transcript: `<dir>/<stem>_summary.log`
pub fn summary_path(transcript: &Path) -> PathBuf {
    summary_config(transcript).file_path()
}

fn summary_config(transcript: &Path) -> LogConfig {
    let dir = match transcript.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let stem = transcript
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    LogConfig::new(dir).with_name(format!("{stem}_summary"))
}

/// Append the report for `result` next to `transcript`.
///
/// `None` writes the failure line instead of a report.
///
/// # Errors
///
/// Returns error if the summary file cannot be written
pub fn write_summary(
    result: Option<&AnalysisResult>,
    transcript: &Path,
) -> Result<PathBuf, ReplayError> {
    let mut log = TranscriptLog::new();
    let path = log.start(&summary_config(transcript))?;

    let entries = match result {
        Some(result) => SummaryRenderer::entries(result),
        None => vec![(Severity::Error, ANALYSIS_FAILED.to_string())],
    };
    for (severity, line) in entries {
        log.note(severity, &line)?;
    }
    log.stop();
    Ok(path)
}

/// The aggregate line of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateLine {
    /// Test invocations
    pub tests: u64,
    /// Failures
    pub fails: u64,
    /// Ignored tests
    pub ignored: u64,
    /// Per-test hangs
    pub hangs: u64,
    /// Error-coded lines
    pub error_messages: u64,
}

impl AggregateLine {
    /// Totals of an analysis
    #[must_use]
    pub fn from_result(result: &AnalysisResult) -> Self {
        Self {
            tests: result.total_tests,
            fails: result.total_failed,
            ignored: result.total_ignored,
            hangs: result.total_hangs,
            error_messages: result.total_error_messages,
        }
    }

    /// Parse an aggregate line the way report consumers do
    pub fn parse(text: &str) -> Option<Self> {
        let caps = AGGREGATE_PATTERN.captures(text)?;
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
        Some(Self {
            tests: field(1)?,
            fails: field(2)?,
            ignored: field(3)?,
            hangs: field(4)?,
            error_messages: field(5)?,
        })
    }

    /// First aggregate line found in a report
    pub fn find_in(report: &str) -> Option<Self> {
        report.lines().find_map(Self::parse)
    }

    /// Tests neither failed, ignored, nor hung
    pub fn passed(&self) -> u64 {
        self.tests
            .saturating_sub(self.fails)
            .saturating_sub(self.ignored)
            .saturating_sub(self.hangs)
    }
}

impl std::fmt::Display for AggregateLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Tests {} Fails {} Ignored {} Hangs {} Error Messages",
            self.tests, self.fails, self.ignored, self.hangs, self.error_messages
        )
    }
}
