//! Bounded log of command failures for later inspection by clients.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::history::now_rfc3339;
use crate::registry::{CommandError, ErrorKind};

/// Entries retained before the oldest is evicted.
pub const ERROR_LOG_CAPACITY: usize = 100;

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// Opaque identifier.
    pub id: String,
    /// RFC 3339 time of the failure.
    pub timestamp: String,
    /// Error classification.
    pub kind: ErrorKind,
    /// Message returned to the client.
    pub message: String,
    /// Command type, batch index or operation id involved.
    pub context: Value,
}

/// FIFO of the most recent failures with a lifetime counter.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    records: VecDeque<ErrorRecord>,
    capacity: usize,
    total: u64,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(ERROR_LOG_CAPACITY)
    }
}

impl ErrorLog {
    /// Creates an empty log retaining `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
        }
    }

    /// Records a failure and returns its id.
    pub fn record(&mut self, error: &CommandError, context: Value) -> String {
        let record = ErrorRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: now_rfc3339(),
            kind: error.kind(),
            message: error.to_string(),
            context,
        };
        let id = record.id.clone();
        self.total += 1;
        if self.capacity > 0 {
            while self.records.len() >= self.capacity {
                self.records.pop_front();
            }
            self.records.push_back(record);
        }
        id
    }

    /// Most recent records first, optionally restricted to one kind.
    pub fn recent(
        &self,
        kind: Option<ErrorKind>,
        limit: usize,
    ) -> impl Iterator<Item = &ErrorRecord> {
        self.records
            .iter()
            .rev()
            .filter(move |record| kind.is_none_or(|kind| record.kind == kind))
            .take(limit)
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&ErrorRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Failures recorded since start-up, including cleared ones.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Drops retained records; the lifetime counter is kept.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn lists_recent_first_with_kind_filter() {
        let mut log = ErrorLog::default();
        log.record(&CommandError::unknown_domain("a"), json!({"commandType": "a.X"}));
        log.record(&CommandError::handler("boom"), json!({"commandType": "b.Y"}));
        log.record(&CommandError::unknown_domain("c"), json!({"commandType": "c.Z"}));

        let messages: Vec<&str> = log
            .recent(Some(ErrorKind::UnknownDomain), 10)
            .map(|record| record.message.as_str())
            .collect();
        assert_eq!(messages, ["unknown domain: c", "unknown domain: a"]);
        assert_eq!(log.recent(None, 1).count(), 1);
    }

    #[test]
    fn evicts_oldest_and_counts_everything() {
        let mut log = ErrorLog::new(2);
        let first = log.record(&CommandError::Cancelled, Value::Null);
        log.record(&CommandError::Cancelled, Value::Null);
        log.record(&CommandError::Cancelled, Value::Null);

        assert_eq!(log.len(), 2);
        assert!(log.find(&first).is_none());
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.total(), 3);
    }

    #[test]
    fn records_are_found_by_id() {
        let mut log = ErrorLog::default();
        let id = log.record(&CommandError::handler("boom"), json!({"batchIndex": 2}));
        let record = log.find(&id).expect("record");
        assert_eq!(record.kind, ErrorKind::Handler);
        assert_eq!(record.context, json!({"batchIndex": 2}));
    }
}
