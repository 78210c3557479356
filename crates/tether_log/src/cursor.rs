//! Cursor for walking transcript lines.
//!
//! Forward-only with a single line of pushback: after `advance` the caller
//! may un-read that one line, so a lookahead decision can be undone.

use tether_core::{LineNumber, TranscriptLine};

/// Errors from cursor movement
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    /// Nothing has been read yet
    #[error("Nothing to push back: cursor is at the start")]
    AtStart,

    /// Only one line of lookahead is supported
    #[error("Line {line} was already pushed back")]
    AlreadyPushedBack { line: LineNumber },
}

/// Pull-based cursor over numbered transcript lines
#[derive(Debug, Clone)]
pub struct LineCursor {
    lines: Vec<TranscriptLine>,
    position: usize,
    can_push_back: bool,
}

impl LineCursor {
    /// Create a cursor at the first line
    #[must_use]
    pub fn new(lines: Vec<TranscriptLine>) -> Self {
        Self {
            lines,
            position: 0,
            can_push_back: false,
        }
    }

    /// Number the lines of `text` and put a cursor in front of them
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::new(TranscriptLine::number_all(text))
    }

    /// Look at the next line without consuming it
    #[must_use]
    pub fn peek(&self) -> Option<&TranscriptLine> {
        self.lines.get(self.position)
    }

    /// Consume the next line
    pub fn advance(&mut self) -> Option<TranscriptLine> {
        let line = self.lines.get(self.position).cloned()?;
        self.position += 1;
        self.can_push_back = true;
        Some(line)
    }

    /// Un-read the line returned by the last `advance`
    ///
    /// # Errors
    ///
    /// Returns error if nothing was read, or if the last line was already
    /// pushed back
    pub fn push_back(&mut self) -> Result<(), CursorError> {
        if self.position == 0 {
            return Err(CursorError::AtStart);
        }
        if !self.can_push_back {
            return Err(CursorError::AlreadyPushedBack {
                line: self.lines[self.position].number,
            });
        }
        self.position -= 1;
        self.can_push_back = false;
        Ok(())
    }

    /// Number of the most recently consumed line still considered read
    #[must_use]
    pub fn last_consumed(&self) -> Option<LineNumber> {
        self.position
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(|line| line.number)
    }

    /// Lines left to read
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lines.len().saturating_sub(self.position)
    }

    /// Whether every line has been consumed
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.position >= self.lines.len()
    }

    /// Total number of lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the transcript has no lines
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Go back to the first line
    pub fn rewind(&mut self) {
        self.position = 0;
        self.can_push_back = false;
    }
}

impl Iterator for LineCursor {
    type Item = TranscriptLine;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}
