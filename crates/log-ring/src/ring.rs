//! The circular log store

use crate::types::{LogEntry, LogLevel};
use std::sync::{PoisonError, RwLock};

/// Fixed-capacity, overwrite-oldest store of recent log entries.
///
/// Holds the `capacity` most recently added entries. `add` and
/// `entries` may be called concurrently from any number of threads;
/// readers always observe a consistent snapshot.
pub struct LogRing {
    inner: RwLock<Slots>,
}

struct Slots {
    slots: Vec<Option<LogEntry>>,
    /// Next slot to write; when the ring is full this is also the
    /// oldest retained entry.
    cursor: usize,
}

impl LogRing {
    /// Create a ring retaining the `capacity` most recent entries.
    ///
    /// `capacity` must be at least 1.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be at least 1");
        Self {
            inner: RwLock::new(Slots {
                slots: vec![None; capacity],
                cursor: 0,
            }),
        }
    }

    /// The fixed capacity of the ring
    pub fn capacity(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }

    /// Add an entry, overwriting the oldest if the ring is full.
    ///
    /// Never fails; a poisoned lock is recovered since slot contents
    /// are plain data.
    pub fn add(&self, entry: LogEntry) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let cursor = inner.cursor;
        inner.slots[cursor] = Some(entry);
        inner.cursor = (cursor + 1) % inner.slots.len();
    }

    /// All retained entries in emission order, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let cap = inner.slots.len();
        (0..cap)
            .map(|i| (inner.cursor + i) % cap)
            .filter_map(|i| inner.slots[i].clone())
            .collect()
    }

    /// Retained entries at or above `min_level`, oldest first.
    ///
    /// `LogLevel::Debug` is an identity pass-through: every retained
    /// entry is returned regardless of its label. At any higher
    /// minimum, entries whose label does not parse are excluded.
    /// A `limit` greater than zero and smaller than the filtered count
    /// truncates to the most recent `limit` entries.
    pub fn filtered(&self, min_level: LogLevel, limit: usize) -> Vec<LogEntry> {
        let mut entries = self.entries();

        if min_level > LogLevel::Debug {
            entries.retain(|e| e.parsed_level().is_some_and(|l| l >= min_level));
        }

        if limit > 0 && limit < entries.len() {
            let drop_count = entries.len() - limit;
            entries.drain(..drop_count);
        }

        entries
    }
}
