//! Analysis statistics.
//!
//! Per-test records are keyed by the normalized command text and kept in
//! first-sighting order so that reports are deterministic.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tether_core::LineNumber;

/// One recorded event inside a test window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Events represented by this entry
    pub count: u64,
    /// Transcript line the event was attributed to
    pub line: LineNumber,
}

impl Occurrence {
    /// A single event at `line`
    #[must_use]
    pub fn at(line: LineNumber) -> Self {
        Self { count: 1, line }
    }
}

/// Statistics for one test command across a transcript
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStats {
    /// Times the command was started
    pub total: u64,
    /// Invocations resolved as passed
    pub success: u64,
    /// Set once any invocation ended without a result
    pub timeout: bool,
    /// Failure occurrences in transcript order
    pub failures: Vec<Occurrence>,
    /// Ignored occurrences in transcript order
    pub ignored: Vec<Occurrence>,
    /// Hang occurrences in transcript order
    pub hangs: Vec<Occurrence>,
    /// Error-coded lines seen inside the command's windows
    pub error_messages: u64,
}

impl TestStats {
    /// Sum of failure counts
    pub fn failure_count(&self) -> u64 {
        self.failures.iter().map(|o| o.count).sum()
    }

    /// Sum of ignored counts
    pub fn ignored_count(&self) -> u64 {
        self.ignored.iter().map(|o| o.count).sum()
    }

    /// Sum of hang counts
    pub fn hang_count(&self) -> u64 {
        self.hangs.iter().map(|o| o.count).sum()
    }
}

/// Hang banners counted independently of any test window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandHangTally {
    /// Number of hang banners
    pub count: u64,
    /// Line of each banner
    pub lines: Vec<LineNumber>,
}

impl CommandHangTally {
    /// Record a banner at `line`
    pub fn record(&mut self, line: LineNumber) {
        self.count += 1;
        self.lines.push(line);
    }
}

/// Everything one analysis pass produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Iteration markers seen
    pub iterations: u64,
    /// Sum of invocations across all tests
    pub total_tests: u64,
    /// Sum of successes
    pub total_passed: u64,
    /// Sum of failure counts
    pub total_failed: u64,
    /// Sum of per-test hang counts
    pub total_hangs: u64,
    /// Sum of ignored counts
    pub total_ignored: u64,
    /// Sum of error-coded lines inside test windows
    pub total_error_messages: u64,
    /// Set if any test timed out
    pub timeout_flag: bool,
    /// Per-test statistics in first-sighting order
    pub test_stats: IndexMap<String, TestStats>,
    /// Hang banners counted at command level
    pub command_hangs: CommandHangTally,
}

impl AnalysisResult {
    /// Aggregate per-test statistics into a result
    #[must_use]
    pub fn from_stats(
        iterations: u64,
        test_stats: IndexMap<String, TestStats>,
        command_hangs: CommandHangTally,
    ) -> Self {
        let mut result = Self {
            iterations,
            command_hangs,
            ..Self::default()
        };
        for stats in test_stats.values() {
            result.total_tests += stats.total;
            result.total_passed += stats.success;
            result.total_failed += stats.failure_count();
            result.total_hangs += stats.hang_count();
            result.total_ignored += stats.ignored_count();
            result.total_error_messages += stats.error_messages;
            result.timeout_flag |= stats.timeout;
        }
        result.test_stats = test_stats;
        result
    }

    /// True when no failures, ignored tests, or per-test hangs were found
    pub fn is_clean(&self) -> bool {
        self.total_failed == 0 && self.total_ignored == 0 && self.total_hangs == 0
    }

    /// Statistics for one test key
    pub fn test(&self, key: &str) -> Option<&TestStats> {
        self.test_stats.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result_is_clean() {
        let result = AnalysisResult::default();
        assert!(result.is_clean());
        assert_eq!(result.total_tests, 0);
    }

    #[test]
    fn test_from_stats_sums() {
        let mut stats = IndexMap::new();
        stats.insert(
            "google_tests a".to_string(),
            TestStats {
                total: 2,
                success: 1,
                failures: vec![Occurrence::at(LineNumber::from_raw(4))],
                error_messages: 3,
                ..TestStats::default()
            },
        );
        stats.insert(
            "aon b".to_string(),
            TestStats {
                total: 1,
                timeout: true,
                hangs: vec![Occurrence::at(LineNumber::from_raw(9))],
                ..TestStats::default()
            },
        );

        let result = AnalysisResult::from_stats(1, stats, CommandHangTally::default());
        assert_eq!(result.total_tests, 3);
        assert_eq!(result.total_passed, 1);
        assert_eq!(result.total_failed, 1);
        assert_eq!(result.total_hangs, 1);
        assert_eq!(result.total_error_messages, 3);
        assert!(result.timeout_flag);
        assert!(!result.is_clean());
    }

    #[test]
    fn test_command_hang_tally() {
        let mut tally = CommandHangTally::default();
        tally.record(LineNumber::from_raw(3));
        tally.record(LineNumber::from_raw(8));
        assert_eq!(tally.count, 2);
        assert_eq!(tally.lines[1].as_u64(), 8);
    }

    #[test]
    fn test_result_serializes_in_order() {
        let mut stats = IndexMap::new();
        stats.insert("z".to_string(), TestStats::default());
        stats.insert("a".to_string(), TestStats::default());
        let result = AnalysisResult::from_stats(0, stats, CommandHangTally::default());
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.find("\"z\"").unwrap() < json.find("\"a\"").unwrap());
    }
}
