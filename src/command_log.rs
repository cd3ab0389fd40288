use std::collections::VecDeque;

use chrono::{DateTime, Local, Utc};

use crate::sync::event::CommandEntry;

/// Maximum number of entries kept for display.
pub const COMMAND_LOG_CAPACITY: usize = 50;

/// Most recent command/detection events, newest first.
#[derive(Debug, Clone)]
pub struct CommandLog {
    entries: VecDeque<CommandEntry>,
    capacity: usize,
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new(COMMAND_LOG_CAPACITY)
    }
}

impl CommandLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, entry: CommandEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Local only; the backend keeps its own history.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandEntry> {
        self.entries.iter()
    }

    /// `[HH:MM:SS] text`, newest first
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(format_entry).collect()
    }
}

pub fn format_entry(entry: &CommandEntry) -> String {
    let secs = entry.timestamp.trunc() as i64;
    let nanos = (entry.timestamp.fract() * 1e9) as u32;
    let time = DateTime::<Utc>::from_timestamp(secs, nanos)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    format!("[{}] {}", time, entry.text())
}
