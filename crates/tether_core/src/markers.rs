//! Marker configuration.
//!
//! The shell under test has no fixed output schema, so every string the
//! analyzer and driver look for is configuration. `Default` carries the
//! markers emitted by the vendor test firmware.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default idle prompt emitted by the device shell
pub const DEFAULT_PROMPT: &str = "gsp ]";

/// Default banner written to the transcript when a command hangs
pub const DEFAULT_HANG_BANNER: &str = "--------Hang--------";

/// ANSI red foreground
pub const ANSI_RED: &str = "\x1b[31m";

/// ANSI bright red foreground
pub const ANSI_BRIGHT_RED: &str = "\x1b[91m";

/// Every marker used to drive the device and to read transcripts back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Idle prompt that terminates every response
    pub prompt: String,
    /// Line marking the start of a new iteration of the command sequence
    pub iteration_marker: String,
    /// Prefixes that start a test command
    pub test_markers: Vec<String>,
    /// Substrings that disqualify an otherwise matching test start
    pub disqualifying_markers: Vec<String>,
    /// Byte sequences flagging an error-coded line
    pub error_markers: Vec<String>,
    /// Banner the driver writes when a command hangs
    pub hang_banner: String,
    /// Banners that resolve a test as passed without a numeric result
    pub success_banners: Vec<String>,
    /// Banner printed when the test framework reports its elapsed time
    pub elapsed_banner: String,
    /// Lines (matched exactly after trimming) closing the test output body
    pub content_end_banners: Vec<String>,
    /// `<N> Tests <N> Failures <N> Ignored`
    pub result_pattern: String,
    /// `(PASSED|FAILED) - <N>`, paired over two lines
    pub paired_result_pattern: String,
    /// Lines after the elapsed banner in which a result must appear
    pub result_window: u64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            iteration_marker: "otp_tool get_serial_num".to_string(),
            test_markers: strings(&["google_tests ", "jedec_ufs ", "aon ", "gsa "]),
            disqualifying_markers: strings(&["\"google_tests", "cpm-exec", "aon =", "I gsa.test:"]),
            error_markers: strings(&[ANSI_RED, ANSI_BRIGHT_RED]),
            hang_banner: DEFAULT_HANG_BANNER.to_string(),
            success_banners: strings(&["gsa: Test Passed", "returned 0 --> PASS"]),
            elapsed_banner: "Total Execution Time:".to_string(),
            content_end_banners: strings(&[
                "-----------------------",
                "*********** TEST SUMMARY **************",
            ]),
            result_pattern: r"(\d+)\s+Tests\s+(\d+)\s+Failures\s+(\d+)\s+Ignored".to_string(),
            paired_result_pattern: r"(?:PASSED|FAILED) - (\d+)".to_string(),
            result_window: 3,
        }
    }
}

/// Whether `bytes` contains any non-empty marker
#[must_use]
pub fn contains_marker(bytes: &[u8], markers: &[String]) -> bool {
    markers
        .iter()
        .filter(|m| !m.is_empty())
        .any(|m| bytes.windows(m.len()).any(|w| w == m.as_bytes()))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl MarkerConfig {
    /// Load markers from a JSON file; missing fields keep their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid JSON, or
    /// fails validation
    pub fn from_json_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound {
                kind: "Marker config".to_string(),
                id: path.display().to_string(),
            },
            _ => CoreError::from(e),
        })?;
        Self::from_json(&json)
    }

    /// Parse markers from JSON text
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid JSON or fails validation
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the markers can drive an analysis
    ///
    /// # Errors
    ///
    /// Returns the first empty marker found
    pub fn validate(&self) -> CoreResult<()> {
        let required = [
            ("prompt", self.prompt.as_str()),
            ("hang_banner", self.hang_banner.as_str()),
            ("elapsed_banner", self.elapsed_banner.as_str()),
            ("result_pattern", self.result_pattern.as_str()),
            ("paired_result_pattern", self.paired_result_pattern.as_str()),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(CoreError::Validation {
                    field: field.to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        if self.test_markers.iter().any(String::is_empty) {
            return Err(CoreError::Validation {
                field: "test_markers".to_string(),
                reason: "empty prefix matches every line".to_string(),
            });
        }
        if self.result_window == 0 {
            return Err(CoreError::Validation {
                field: "result_window".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Set the idle prompt
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Add a test-start prefix
    #[must_use]
    pub fn with_test_marker(mut self, marker: impl Into<String>) -> Self {
        self.test_markers.push(marker.into());
        self
    }

    /// Add a hard-coded success banner
    #[must_use]
    pub fn with_success_banner(mut self, banner: impl Into<String>) -> Self {
        self.success_banners.push(banner.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_markers() {
        let config = MarkerConfig::default();
        assert_eq!(config.prompt.len(), 5);
        assert_eq!(config.result_window, 3);
        assert!(config.test_markers.contains(&"google_tests ".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_contains_marker() {
        let markers = MarkerConfig::default().error_markers;
        assert!(contains_marker(b"\x1b[31mFAIL\x1b[0m", &markers));
        assert!(contains_marker(b"x \x1b[91m y", &markers));
        assert!(!contains_marker(b"\x1b[32mok", &markers));
        assert!(!contains_marker(b"anything", &[String::new()]));
    }

    #[test]
    fn test_from_json_partial_keeps_defaults() {
        let config = MarkerConfig::from_json(r#"{"prompt": "e24]"}"#).unwrap();
        assert_eq!(config.prompt, "e24]");
        assert_eq!(config.hang_banner, DEFAULT_HANG_BANNER);
    }

    #[test]
    fn test_from_json_rejects_empty_prefix() {
        let err = MarkerConfig::from_json(r#"{"test_markers": [""]}"#).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn test_from_json_rejects_zero_window() {
        assert!(MarkerConfig::from_json(r#"{"result_window": 0}"#).is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"iteration_marker": "boot"}}"#).unwrap();
        let config = MarkerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.iteration_marker, "boot");
    }

    #[test]
    fn test_from_json_file_missing() {
        let err = MarkerConfig::from_json_file("/nonexistent/markers.json").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn test_builders() {
        let config = MarkerConfig::default()
            .with_prompt("a32]")
            .with_test_marker("hsio ")
            .with_success_banner("ALL OK");
        assert_eq!(config.prompt, "a32]");
        assert!(config.test_markers.contains(&"hsio ".to_string()));
        assert!(config.success_banners.contains(&"ALL OK".to_string()));
    }
}
