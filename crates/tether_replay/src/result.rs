//! Result line recognition.

use crate::error::ReplayError;
use regex::Regex;
use tether_core::MarkerConfig;

/// A numeric result reported by the test framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultLine {
    /// `<N> Tests <N> Failures <N> Ignored`
    Tally {
        /// Tests run
        tests: u64,
        /// Tests failed
        failures: u64,
        /// Tests ignored
        ignored: u64,
    },
    /// One half of a `(PASSED|FAILED) - <N>` pair
    Paired {
        /// Captured count
        count: u64,
    },
}

/// Compiled result patterns
#[derive(Debug, Clone)]
pub struct ResultMatcher {
    tally: Regex,
    paired: Regex,
}

impl ResultMatcher {
    /// Compile both result patterns
    ///
    /// # Errors
    ///
    /// Returns error if either pattern is not a valid regex or has too few
    /// capture groups
    pub fn new(markers: &MarkerConfig) -> Result<Self, ReplayError> {
        let tally = compile("result_pattern", &markers.result_pattern, 3)?;
        let paired = compile("paired_result_pattern", &markers.paired_result_pattern, 1)?;
        Ok(Self { tally, paired })
    }

    /// Match a line against the tally form first, then the paired form
    pub fn match_line(&self, text: &str) -> Option<ResultLine> {
        if let Some(caps) = self.tally.captures(text) {
            let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
            return Some(ResultLine::Tally {
                tests: field(1)?,
                failures: field(2)?,
                ignored: field(3)?,
            });
        }
        let caps = self.paired.captures(text)?;
        let count = caps.get(1)?.as_str().parse().ok()?;
        Some(ResultLine::Paired { count })
    }
}

fn compile(field: &str, pattern: &str, groups: usize) -> Result<Regex, ReplayError> {
    let regex = Regex::new(pattern).map_err(|e| ReplayError::InvalidPattern {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    // captures_len counts the implicit whole-match group
    if regex.captures_len() <= groups {
        return Err(ReplayError::InvalidPattern {
            field: field.to_string(),
            reason: format!("needs {groups} capture group(s)"),
        });
    }
    Ok(regex)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> ResultMatcher {
        ResultMatcher::new(&MarkerConfig::default()).unwrap()
    }

    #[test]
    fn test_tally_line() {
        assert_eq!(
            matcher().match_line("12 Tests 1 Failures 2 Ignored"),
            Some(ResultLine::Tally {
                tests: 12,
                failures: 1,
                ignored: 2
            })
        );
    }

    #[test]
    fn test_paired_line() {
        assert_eq!(
            matcher().match_line("PASSED - 7"),
            Some(ResultLine::Paired { count: 7 })
        );
        assert_eq!(
            matcher().match_line("FAILED - 0"),
            Some(ResultLine::Paired { count: 0 })
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(matcher().match_line("Tests: all good"), None);
    }

    #[test]
    fn test_overflowing_count_is_no_match() {
        let line = "99999999999999999999999 Tests 0 Failures 0 Ignored";
        assert_eq!(matcher().match_line(line), None);
    }

    #[test]
    fn test_invalid_pattern() {
        let mut markers = MarkerConfig::default();
        markers.result_pattern = "(".to_string();
        assert!(matches!(
            ResultMatcher::new(&markers),
            Err(ReplayError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_pattern_without_groups() {
        let mut markers = MarkerConfig::default();
        markers.paired_result_pattern = "PASSED".to_string();
        assert!(matches!(
            ResultMatcher::new(&markers),
            Err(ReplayError::InvalidPattern { .. })
        ));
    }
}
