//! Output log of a run
//!
//! Lines are appended in emission order and never reordered. The log is
//! cleared when a new generation is loaded.

use crate::abi::ConsoleLevel;
use serde::{Deserialize, Serialize};

/// One rendered console line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub seq: u64,
    pub level: ConsoleLevel,
    pub text: String,
}

/// Ordered collector of console lines
#[derive(Debug, Default)]
pub struct OutputLog {
    lines: Vec<OutputLine>,
    next_seq: u64,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line and return its sequence number
    pub fn push(&mut self, level: ConsoleLevel, text: impl Into<String>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.lines.push(OutputLine {
            seq,
            level,
            text: text.into(),
        });
        seq
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    /// Most recent line; the view keeps it scrolled into sight
    pub fn latest(&self) -> Option<&OutputLine> {
        self.lines.last()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.text.clone()).collect()
    }

    pub fn by_level(&self, level: ConsoleLevel) -> Vec<&OutputLine> {
        self.lines.iter().filter(|l| l.level == level).collect()
    }

    pub fn errors(&self) -> Vec<&OutputLine> {
        self.by_level(ConsoleLevel::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.lines.iter().any(|l| l.level == ConsoleLevel::Error)
    }

    pub fn take_lines(&mut self) -> Vec<OutputLine> {
        std::mem::take(&mut self.lines)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
