//! Bounded log of executed commands.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::time::Duration;

use camino::Utf8Path;
use scenebridge_protocol::CommandResponse;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// One executed command and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// RFC 3339 time the command finished.
    pub timestamp: String,
    /// Command type as sent by the client.
    pub command_type: String,
    /// Parameters as sent by the client.
    pub parameters: Value,
    /// Response returned to the client.
    pub response: CommandResponse,
    /// Execution time in milliseconds.
    pub execution_time_ms: f64,
}

impl HistoryEntry {
    /// Builds an entry stamped with the current time.
    pub fn new(
        command_type: impl Into<String>,
        parameters: Value,
        response: CommandResponse,
        elapsed: Duration,
    ) -> Self {
        Self {
            timestamp: now_rfc3339(),
            command_type: command_type.into(),
            parameters,
            response,
            execution_time_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Fixed-capacity FIFO of [`HistoryEntry`] values, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl History {
    /// Creates an empty history holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest once full.
    pub fn record(&mut self, entry: HistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// All entries, most recent last.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Changes the capacity, evicting the oldest entries to fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
    }

    /// Writes the entries to `path` as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns any I/O or serialisation failure.
    pub fn write_json(&self, path: &Utf8Path) -> io::Result<()> {
        let entries: Vec<&HistoryEntry> = self.entries.iter().collect();
        let document = serde_json::to_vec_pretty(&entries).map_err(io::Error::other)?;
        fs::write(path, document)
    }
}
