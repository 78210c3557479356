//! Transcript analyzer.
//!
//! One forward pass over the transcript with a single line of pushback.
//! Outside a test window only iteration markers, hang banners and test
//! starts matter. A test start opens a window that runs until the next
//! test start, a success banner, or end of input. Inside the window the
//! outcome is resolved from, in order of preference:
//!
//! 1. a numeric result line, either directly or within `result_window`
//!    lines after the elapsed banner and a content-end line
//! 2. a success banner
//! 3. nothing, which is a timeout with a hang at the last consumed line

use crate::classify::{LineTag, MarkerTable};
use crate::error::ReplayError;
use crate::result::{ResultLine, ResultMatcher};
use crate::stats::{AnalysisResult, CommandHangTally, Occurrence, TestStats};
use indexmap::IndexMap;
use std::path::Path;
use tether_core::{LineNumber, MarkerConfig, TranscriptLine};
use tether_log::{read_transcript, LineCursor};
use tracing::{debug, info};

/// Reconstructs test statistics from a transcript
#[derive(Debug, Clone)]
pub struct Analyzer {
    table: MarkerTable,
    results: ResultMatcher,
    window: u64,
}

impl Analyzer {
    /// Build an analyzer for the given markers
    ///
    /// # Errors
    ///
    /// Returns error if the markers are invalid or a pattern fails to compile
    pub fn new(markers: &MarkerConfig) -> Result<Self, ReplayError> {
        Ok(Self {
            table: MarkerTable::new(markers)?,
            results: ResultMatcher::new(markers)?,
            window: markers.result_window,
        })
    }

    /// Analyze a transcript file
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist, `Io` if it cannot be read
    pub fn analyze_file(&self, path: impl AsRef<Path>) -> Result<AnalysisResult, ReplayError> {
        let path = path.as_ref();
        let lines = read_transcript(path)?;
        info!(path = %path.display(), lines = lines.len(), "analyzing transcript");
        Ok(self.analyze_lines(lines))
    }

    /// Analyze transcript text already in memory
    pub fn analyze_text(&self, text: &str) -> AnalysisResult {
        self.analyze_lines(TranscriptLine::number_all(text))
    }

    /// Analyze numbered transcript lines
    pub fn analyze_lines(&self, lines: Vec<TranscriptLine>) -> AnalysisResult {
        let mut pass = Pass {
            analyzer: self,
            cursor: LineCursor::new(lines),
            iterations: 0,
            tests: IndexMap::new(),
            command_hangs: CommandHangTally::default(),
        };
        pass.run();
        AnalysisResult::from_stats(pass.iterations, pass.tests, pass.command_hangs)
    }
}

/// A resolved numeric result and the line it was read from
#[derive(Debug, Clone, Copy)]
enum Found {
    Tally {
        failures: u64,
        ignored: u64,
        line: LineNumber,
    },
    Paired {
        failures: u64,
        line: LineNumber,
    },
}

#[derive(Debug, Default)]
struct Window {
    result: Option<Found>,
    success_banner: bool,
    elapsed_seen: bool,
    hangs: Vec<LineNumber>,
    error_messages: u64,
}

struct Pass<'a> {
    analyzer: &'a Analyzer,
    cursor: LineCursor,
    iterations: u64,
    tests: IndexMap<String, TestStats>,
    command_hangs: CommandHangTally,
}

impl Pass<'_> {
    fn run(&mut self) {
        while let Some(line) = self.cursor.advance() {
            match self.analyzer.table.classify(&line.text) {
                LineTag::IterationMarker => self.iterations += 1,
                LineTag::HangBanner => self.command_hangs.record(line.number),
                LineTag::StartsTest { key } => self.scan_test(key, line.number),
                _ => {}
            }
        }
    }

    fn scan_test(&mut self, key: String, start: LineNumber) {
        let mut window = Window::default();

        while let Some(line) = self.cursor.advance() {
            match self.analyzer.table.classify(&line.text) {
                LineTag::StartsTest { .. } => {
                    self.un_read();
                    break;
                }
                LineTag::IterationMarker => self.iterations += 1,
                LineTag::HangBanner => {
                    self.command_hangs.record(line.number);
                    window.hangs.push(line.number);
                }
                LineTag::ErrorMarker => window.error_messages += 1,
                LineTag::SuccessBanner => {
                    window.success_banner = true;
                    break;
                }
                LineTag::ElapsedBanner => {
                    window.elapsed_seen = true;
                    if let Some(found) = self.timed_result(line.number) {
                        window.result = Some(found);
                    }
                }
                _ if !window.elapsed_seen => {
                    if let Some(found) = self.read_result(&line) {
                        window.result = Some(found);
                    }
                }
                _ => {}
            }
        }

        let last = self.cursor.last_consumed().unwrap_or(start);
        let stats = self.tests.entry(key).or_default();
        stats.total += 1;
        stats.hangs.extend(window.hangs.iter().copied().map(Occurrence::at));
        stats.error_messages += window.error_messages;

        match (window.result, window.success_banner) {
            (Some(Found::Tally { failures, ignored, line }), _) => {
                if failures > 0 {
                    stats.failures.push(Occurrence::at(line));
                }
                if ignored > 0 {
                    stats.ignored.push(Occurrence::at(line));
                }
                if failures == 0 && ignored == 0 {
                    stats.success += 1;
                }
            }
            (Some(Found::Paired { failures, line }), _) => {
                if failures > 0 {
                    stats.failures.push(Occurrence::at(line));
                } else {
                    stats.success += 1;
                }
            }
            (None, true) => {
                debug!(line = %start, "success banner resolved test");
                stats.success += 1;
            }
            (None, false) => {
                debug!(line = %start, hang = %last, "no result found for test");
                stats.timeout = true;
                stats.hangs.push(Occurrence::at(last));
            }
        }
    }

    /// Search for a result after the elapsed banner at `elapsed`.
    ///
    /// A content-end line must appear first; both searches stop once the
    /// line number reaches `elapsed + window`.
    fn timed_result(&mut self, elapsed: LineNumber) -> Option<Found> {
        let limit = elapsed.offset(self.analyzer.window);

        while let Some(line) = self.cursor.advance() {
            match self.analyzer.table.classify(&line.text) {
                LineTag::StartsTest { .. } => {
                    self.un_read();
                    return None;
                }
                LineTag::ContentEnd => return self.result_after_content_end(limit),
                _ if line.number >= limit => {
                    debug!(line = %elapsed, "no elapsed timer found");
                    return None;
                }
                _ => {}
            }
        }
        None
    }

    fn result_after_content_end(&mut self, limit: LineNumber) -> Option<Found> {
        while let Some(line) = self.cursor.advance() {
            if self.analyzer.table.classify(&line.text).starts_test() {
                self.un_read();
                return None;
            }
            if let Some(found) = self.read_result(&line) {
                return Some(found);
            }
            if line.number >= limit {
                return None;
            }
        }
        None
    }

    /// Match `line` as a result; the paired form consumes one extra line
    fn read_result(&mut self, line: &TranscriptLine) -> Option<Found> {
        match self.analyzer.results.match_line(&line.text)? {
            ResultLine::Tally {
                failures, ignored, ..
            } => Some(Found::Tally {
                failures,
                ignored,
                line: line.number,
            }),
            ResultLine::Paired { .. } => {
                let next = self.cursor.advance()?;
                match self.analyzer.results.match_line(&next.text) {
                    Some(ResultLine::Paired { count }) => Some(Found::Paired {
                        failures: count,
                        line: line.number,
                    }),
                    _ => {
                        debug!(line = %line.number, "paired result without failure count");
                        self.un_read();
                        None
                    }
                }
            }
        }
    }

    fn un_read(&mut self) {
        if let Err(err) = self.cursor.push_back() {
            debug!(error = %err, "push back rejected");
        }
    }
}
