//! Durable state for the blocked-number service.
//!
//! All persistent state is managed through the [`Storage`] trait:
//! - **Block list**: [`BlockedEntry`] rows, unique by original number
//! - **Settings**: key→bool and key→i64 values (enhanced blocking, suppression)
//!
//! # Implementations
//!
//! - [`MemoryStorage`]: In-memory, volatile - for development/testing
//! - [`PersistentStorage`]: Fjall-backed, durable - for production
//!
//! Both serialize writers and let readers run concurrently; a reader sees
//! either the state before or after a write, never a partial row.

mod factory;
pub mod filter;
mod memory;
mod persistent;
pub mod types;

pub use factory::create_storage;
pub use filter::{FilterError, Selection, SortOrder};
pub use memory::MemoryStorage;
pub use persistent::PersistentStorage;
pub use types::*;

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Storage error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend (LSM tree) failure.
    #[error("storage backend error: {0}")]
    Backend(#[from] fjall::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored bytes do not decode to the expected shape.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Key longer than the backend can index.
    #[error("key of {0} bytes is too long to store")]
    KeyTooLong(usize),
}

// =============================================================================
// Storage Traits
// =============================================================================

/// Block list persistence.
pub trait BlockListStore: Send + Sync {
    /// Insert an entry, replacing any entry with the same original number.
    fn insert(&self, original: &str, e164: &str) -> Result<EntryId, StoreError>;

    /// Delete all entries matching the selection. Returns the number removed.
    fn delete(&self, selection: &Selection) -> Result<usize, StoreError>;

    /// Whether any entry matches `original`, or a non-empty `e164`.
    fn exists(&self, original: &str, e164: &str) -> Result<bool, StoreError>;

    /// Snapshot of all entries matching the selection, in id order.
    fn select(&self, selection: &Selection) -> Result<Vec<BlockedEntry>, StoreError>;

    /// Number of stored entries.
    fn count(&self) -> Result<usize, StoreError>;

    /// Query entries into a cancellable cursor.
    ///
    /// A token that is already cancelled yields an empty cursor.
    fn query(
        &self,
        selection: &Selection,
        sort: &SortOrder,
        cancel: &CancellationToken,
    ) -> Result<EntryCursor, StoreError> {
        if cancel.is_cancelled() {
            return Ok(EntryCursor::new(Vec::new(), cancel.clone()));
        }
        let mut entries = self.select(selection)?;
        sort.apply(&mut entries);
        Ok(EntryCursor::new(entries, cancel.clone()))
    }
}

/// Key/value persistence for settings.
pub trait KeyValueStore: Send + Sync {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError>;

    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError>;

    fn get_i64(&self, key: &str) -> Result<Option<i64>, StoreError>;

    fn set_i64(&self, key: &str, value: i64) -> Result<(), StoreError>;
}

/// Unified storage for all service state.
pub trait Storage: BlockListStore + KeyValueStore {
    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;

    /// Flush pending writes to disk (no-op for in-memory).
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Shared storage handle.
pub type SharedStorage = Arc<dyn Storage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query_sorts_and_honors_cancel() {
        let store = MemoryStorage::new();
        store.insert("b", "").unwrap();
        store.insert("a", "").unwrap();

        let sort = SortOrder::parse(Some("original_number")).unwrap();
        let token = CancellationToken::new();
        let names: Vec<_> = store
            .query(&Selection::All, &sort, &token)
            .unwrap()
            .map(|e| e.original_number)
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        token.cancel();
        let cursor = store.query(&Selection::All, &sort, &token).unwrap();
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Corrupt("bad id".to_string());
        assert!(err.to_string().contains("bad id"));
    }
}
