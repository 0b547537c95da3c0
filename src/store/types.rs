//! Types for the blocked-number store.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Unique blocked-entry identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    /// Create an entry ID from a raw value.
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A blocked number record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedEntry {
    /// Row identifier
    pub id: EntryId,
    /// Number exactly as the caller supplied it
    pub original_number: String,
    /// Canonical form, empty when normalization failed
    pub e164_number: String,
}

impl BlockedEntry {
    /// Whether the entry matches `original` or a non-empty canonical `e164`.
    pub fn matches_number(&self, original: &str, e164: &str) -> bool {
        self.original_number == original || (!e164.is_empty() && self.e164_number == e164)
    }
}

/// Queryable columns of a blocked entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    OriginalNumber,
    E164Number,
}

impl Column {
    /// Column name as exposed to callers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::OriginalNumber => "original_number",
            Self::E164Number => "e164_number",
        }
    }

    /// Resolve a caller-supplied column name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Id, Self::OriginalNumber, Self::E164Number]
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// Snapshot cursor over query results.
///
/// Finite and restartable. Checks the cancellation token before each item;
/// once cancelled it yields nothing further.
#[derive(Debug)]
pub struct EntryCursor {
    entries: Vec<BlockedEntry>,
    position: usize,
    cancel: CancellationToken,
}

impl EntryCursor {
    /// Create a cursor over a result snapshot.
    pub fn new(entries: Vec<BlockedEntry>, cancel: CancellationToken) -> Self {
        Self {
            entries,
            position: 0,
            cancel,
        }
    }

    /// Number of rows in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restart iteration from the first row.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Whether the cursor was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Iterator for EntryCursor {
    type Item = BlockedEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let entry = self.entries.get(self.position)?.clone();
        self.position += 1;
        Some(entry)
    }
}
