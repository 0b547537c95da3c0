//! In-memory storage implementation.
//!
//! Volatile storage for development and testing. All data is lost on restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tracing::debug;

use super::filter::Selection;
use super::types::*;
use super::{BlockListStore, KeyValueStore, Storage, StoreError};

/// Block list rows plus the original-number index, guarded together.
#[derive(Default)]
struct BlockTable {
    rows: BTreeMap<EntryId, BlockedEntry>,
    by_original: HashMap<String, EntryId>,
    next_id: u64,
}

/// In-memory storage implementation.
///
/// Thread-safe using RwLock. Suitable for development and testing.
pub struct MemoryStorage {
    table: RwLock<BlockTable>,
    bools: RwLock<HashMap<String, bool>>,
    ints: RwLock<HashMap<String, i64>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        debug!("creating in-memory storage");
        Self {
            table: RwLock::new(BlockTable {
                next_id: 1,
                ..Default::default()
            }),
            bools: RwLock::new(HashMap::new()),
            ints: RwLock::new(HashMap::new()),
        }
    }
}

impl BlockListStore for MemoryStorage {
    fn insert(&self, original: &str, e164: &str) -> Result<EntryId, StoreError> {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());

        if let Some(old) = table.by_original.remove(original) {
            table.rows.remove(&old);
        }

        let id = EntryId::from_u64(table.next_id);
        table.next_id += 1;
        table.rows.insert(
            id,
            BlockedEntry {
                id,
                original_number: original.to_string(),
                e164_number: e164.to_string(),
            },
        );
        table.by_original.insert(original.to_string(), id);

        Ok(id)
    }

    fn delete(&self, selection: &Selection) -> Result<usize, StoreError> {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());

        let doomed: Vec<_> = table
            .rows
            .values()
            .filter(|e| selection.matches(e))
            .map(|e| (e.id, e.original_number.clone()))
            .collect();

        for (id, original) in &doomed {
            table.rows.remove(id);
            table.by_original.remove(original);
        }

        Ok(doomed.len())
    }

    fn exists(&self, original: &str, e164: &str) -> Result<bool, StoreError> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        if table.by_original.contains_key(original) {
            return Ok(true);
        }
        Ok(!e164.is_empty() && table.rows.values().any(|e| e.e164_number == e164))
    }

    fn select(&self, selection: &Selection) -> Result<Vec<BlockedEntry>, StoreError> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        Ok(table
            .rows
            .values()
            .filter(|e| selection.matches(e))
            .cloned()
            .collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.table.read().unwrap_or_else(|e| e.into_inner()).rows.len())
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        Ok(self
            .bools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied())
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.bools
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    fn get_i64(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .ints
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied())
    }

    fn set_i64(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.ints
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_exists() {
        let store = MemoryStorage::new();
        let id = store.insert("+1-555-0100", "+15550100").unwrap();
        assert_eq!(id, EntryId::from_u64(1));

        assert!(store.exists("+1-555-0100", "").unwrap());
        assert!(store.exists("5550100", "+15550100").unwrap());
        assert!(!store.exists("5559999", "+15559999").unwrap());
        assert!(!store.exists("5559999", "").unwrap());
    }

    #[test]
    fn test_insert_replaces_same_original() {
        let store = MemoryStorage::new();
        let first = store.insert("12345", "").unwrap();
        let second = store.insert("12345", "+112345").unwrap();

        assert_ne!(first, second);
        assert_eq!(store.count().unwrap(), 1);

        let rows = store.select(&Selection::All).unwrap();
        assert_eq!(rows[0].id, second);
        assert_eq!(rows[0].e164_number, "+112345");
    }

    #[test]
    fn test_delete_by_selection() {
        let store = MemoryStorage::new();
        let a = store.insert("111", "+1111").unwrap();
        store.insert("222", "+1222").unwrap();
        store.insert("333", "+1222").unwrap();

        assert_eq!(store.delete(&Selection::id(a)).unwrap(), 1);
        assert_eq!(store.delete(&Selection::number("x", "+1222")).unwrap(), 2);
        assert_eq!(store.count().unwrap(), 0);

        // the original index is cleared too
        store.insert("111", "").unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_settings_default_absent() {
        let store = MemoryStorage::new();
        assert_eq!(store.get_bool("k").unwrap(), None);
        assert_eq!(store.get_i64("k").unwrap(), None);

        store.set_bool("k", true).unwrap();
        store.set_i64("k", -1).unwrap();
        assert_eq!(store.get_bool("k").unwrap(), Some(true));
        assert_eq!(store.get_i64("k").unwrap(), Some(-1));
    }
}
