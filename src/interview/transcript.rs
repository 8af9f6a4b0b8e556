//! Append-only interview transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic within one interview; stable key for list rendering.
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    /// True for interviewee answers, false for prompts and rejections.
    pub mine: bool,
}

/// Ordered, append-only log of prompts, answers and rejections.
///
/// Owns its own id sequence so independent interviews never share ids.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    entries: Vec<LogEntry>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interviewer line (prompt, rejection, greeting).
    pub fn push_interviewer(&mut self, content: impl Into<String>) -> &LogEntry {
        self.push(content.into(), false)
    }

    /// Append an interviewee line.
    pub fn push_interviewee(&mut self, content: impl Into<String>) -> &LogEntry {
        self.push(content.into(), true)
    }

    fn push(&mut self, content: String, mine: bool) -> &LogEntry {
        let entry = LogEntry {
            id: self.next_id,
            timestamp: Utc::now(),
            content,
            mine,
        };
        self.next_id += 1;
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}
