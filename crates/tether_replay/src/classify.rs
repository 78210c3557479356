//! Line classification.
//!
//! Every marker in a [`MarkerConfig`] becomes one rule in an ordered table.
//! A line is matched against the whole table once and resolved to a single
//! [`LineTag`]; the analyzer never looks at raw marker strings itself.

use crate::error::ReplayError;
use tether_core::MarkerConfig;

/// What a transcript line means to the analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineTag {
    /// Start of a new iteration of the command sequence
    IterationMarker,
    /// Hang banner written by the driver
    HangBanner,
    /// Line carrying an error marker; never a test start
    ErrorMarker,
    /// Start of a test command
    StartsTest {
        /// Command text from the earliest test prefix to end of line, trimmed
        key: String,
    },
    /// Contains a test prefix but also a disqualifying marker
    Disqualified,
    /// Banner resolving the current test as passed
    SuccessBanner,
    /// Elapsed-time banner opening the result search
    ElapsedBanner,
    /// Line closing the test output body
    ContentEnd,
    /// Anything else
    Plain,
}

impl LineTag {
    /// True for [`LineTag::StartsTest`]
    pub fn starts_test(&self) -> bool {
        matches!(self, Self::StartsTest { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    Iteration,
    Hang,
    Error,
    Disqualify,
    TestStart,
    Success,
    Elapsed,
    ContentEnd,
}

#[derive(Debug, Clone)]
enum Pattern {
    Contains(String),
    /// Equal to the line after trimming
    Exact(String),
}

impl Pattern {
    fn position(&self, text: &str) -> Option<usize> {
        match self {
            Self::Contains(needle) => text.find(needle.as_str()),
            Self::Exact(expected) => (text.trim() == expected.as_str()).then_some(0),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    kind: RuleKind,
    pattern: Pattern,
}

/// Ordered marker table, evaluated once per line
#[derive(Debug, Clone)]
pub struct MarkerTable {
    rules: Vec<Rule>,
}

impl MarkerTable {
    /// Build the table from marker configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration fails validation
    pub fn new(markers: &MarkerConfig) -> Result<Self, ReplayError> {
        markers
            .validate()
            .map_err(|e| ReplayError::InvalidMarkers(e.to_string()))?;

        let mut rules = Vec::new();
        let mut push = |kind: RuleKind, pattern: Pattern| {
            let empty = match &pattern {
                Pattern::Contains(s) | Pattern::Exact(s) => s.is_empty(),
            };
            if !empty {
                rules.push(Rule { kind, pattern });
            }
        };

        push(RuleKind::Iteration, Pattern::Contains(markers.iteration_marker.clone()));
        push(RuleKind::Hang, Pattern::Contains(markers.hang_banner.clone()));
        for marker in &markers.error_markers {
            push(RuleKind::Error, Pattern::Contains(marker.clone()));
        }
        for marker in &markers.disqualifying_markers {
            push(RuleKind::Disqualify, Pattern::Contains(marker.clone()));
        }
        for marker in &markers.test_markers {
            push(RuleKind::TestStart, Pattern::Contains(marker.clone()));
        }
        for banner in &markers.success_banners {
            push(RuleKind::Success, Pattern::Contains(banner.clone()));
        }
        push(RuleKind::Elapsed, Pattern::Contains(markers.elapsed_banner.clone()));
        for banner in &markers.content_end_banners {
            push(RuleKind::ContentEnd, Pattern::Exact(banner.clone()));
        }

        Ok(Self { rules })
    }

    /// Resolve a line to its tag.
    ///
    /// Precedence: iteration, hang, error, test start, success, elapsed,
    /// content end, disqualified, plain.
    pub fn classify(&self, text: &str) -> LineTag {
        let mut start: Option<usize> = None;
        let mut disqualified = false;
        let mut banner: Option<LineTag> = None;

        for rule in &self.rules {
            let Some(at) = rule.pattern.position(text) else {
                continue;
            };
            match rule.kind {
                RuleKind::Iteration => return LineTag::IterationMarker,
                RuleKind::Hang => return LineTag::HangBanner,
                RuleKind::Error => return LineTag::ErrorMarker,
                RuleKind::Disqualify => disqualified = true,
                RuleKind::TestStart => {
                    start = Some(start.map_or(at, |current| current.min(at)));
                }
                RuleKind::Success if banner.is_none() => banner = Some(LineTag::SuccessBanner),
                RuleKind::Elapsed if banner.is_none() => banner = Some(LineTag::ElapsedBanner),
                RuleKind::ContentEnd if banner.is_none() => banner = Some(LineTag::ContentEnd),
                _ => {}
            }
        }

        match (start, disqualified) {
            (Some(at), false) => LineTag::StartsTest {
                key: text[at..].trim().to_string(),
            },
            (Some(_), true) => banner.unwrap_or(LineTag::Disqualified),
            (None, _) => banner.unwrap_or(LineTag::Plain),
        }
    }
}
