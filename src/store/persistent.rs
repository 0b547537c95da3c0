//! Persistent storage using fjall (pure Rust LSM-tree).
//!
//! Durable storage for production use. All data survives restarts.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};

use super::filter::Selection;
use super::types::*;
use super::{BlockListStore, KeyValueStore, Storage, StoreError};

/// Largest key the LSM tree accepts.
const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Settings-partition key holding the next id to hand out.
///
/// Written in the same batch as every insert so ids stay unique across
/// restarts even after the newest rows are deleted.
const NEXT_ID_KEY: &[u8] = b"meta_next_id";

// =============================================================================
// PersistentStorage
// =============================================================================

/// Persistent storage using fjall LSM-tree.
///
/// Block list mutations go through a single writer lock and are committed as
/// one batch across the row and index partitions, so readers never observe a
/// row without its index entries.
pub struct PersistentStorage {
    keyspace: Keyspace,
    /// id (big-endian) -> PersistedEntry
    entries: PartitionHandle,
    /// original number -> id
    by_original: PartitionHandle,
    /// e164 \0 id -> ()
    by_e164: PartitionHandle,
    /// bool_{key} / int_{key} -> value, plus the id high-water mark
    settings: PartitionHandle,
    writer: Mutex<()>,
    next_id: AtomicU64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntry {
    id: u64,
    original_number: String,
    e164_number: String,
}

impl From<PersistedEntry> for BlockedEntry {
    fn from(p: PersistedEntry) -> Self {
        BlockedEntry {
            id: EntryId::from_u64(p.id),
            original_number: p.original_number,
            e164_number: p.e164_number,
        }
    }
}

impl PersistentStorage {
    /// Open or create persistent storage at the given path.
    pub fn open(path: &Path) -> Result<Arc<Self>, StoreError> {
        std::fs::create_dir_all(path)?;

        let keyspace = Config::new(path).open()?;

        let entries =
            keyspace.open_partition("blocked_numbers", PartitionCreateOptions::default())?;
        let by_original =
            keyspace.open_partition("blocked_by_original", PartitionCreateOptions::default())?;
        let by_e164 =
            keyspace.open_partition("blocked_by_e164", PartitionCreateOptions::default())?;
        let settings = keyspace.open_partition("settings", PartitionCreateOptions::default())?;

        let store = Arc::new(Self {
            keyspace,
            entries,
            by_original,
            by_e164,
            settings,
            writer: Mutex::new(()),
            next_id: AtomicU64::new(1),
        });

        store.recover_counter()?;

        tracing::info!(
            path = %path.display(),
            entries = store.entries.len().unwrap_or(0),
            "persistent storage opened"
        );

        Ok(store)
    }

    fn recover_counter(&self) -> Result<(), StoreError> {
        let max_id = match self.entries.last_key_value()? {
            Some((key, _)) => decode_id(&key)?,
            None => 0,
        };
        let high_water = match self.settings.get(NEXT_ID_KEY)? {
            Some(value) => decode_id(&value)?,
            None => 0,
        };

        let next = high_water.max(max_id + 1);
        self.next_id.store(next, Ordering::SeqCst);
        tracing::debug!(max_id, high_water, next, "recovered entry id counter");
        Ok(())
    }

    fn e164_key(e164: &str, id: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(e164.len() + 9);
        key.extend_from_slice(e164.as_bytes());
        key.push(0);
        key.extend_from_slice(&id.to_be_bytes());
        key
    }

    fn load_entry(&self, id: u64) -> Result<Option<PersistedEntry>, StoreError> {
        match self.entries.get(id.to_be_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn scan(&self) -> Result<Vec<PersistedEntry>, StoreError> {
        let mut rows = Vec::new();
        for item in self.entries.iter() {
            let (_, value) = item?;
            rows.push(serde_json::from_slice::<PersistedEntry>(&value)?);
        }
        Ok(rows)
    }
}

fn decode_id(bytes: &[u8]) -> Result<u64, StoreError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("entry key of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

impl BlockListStore for PersistentStorage {
    fn insert(&self, original: &str, e164: &str) -> Result<EntryId, StoreError> {
        if original.len() > MAX_KEY_LEN {
            return Err(StoreError::KeyTooLong(original.len()));
        }
        if e164.len() + 9 > MAX_KEY_LEN {
            return Err(StoreError::KeyTooLong(e164.len()));
        }

        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        let mut batch = self.keyspace.batch();

        if let Some(old) = self.by_original.get(original.as_bytes())? {
            let old_id = decode_id(&old)?;
            if let Some(previous) = self.load_entry(old_id)? {
                if !previous.e164_number.is_empty() {
                    batch.remove(&self.by_e164, Self::e164_key(&previous.e164_number, old_id));
                }
            }
            batch.remove(&self.entries, old_id.to_be_bytes());
            tracing::debug!(old_id, "replacing blocked entry with same original number");
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let persisted = PersistedEntry {
            id,
            original_number: original.to_string(),
            e164_number: e164.to_string(),
        };
        let value = serde_json::to_vec(&persisted)?;

        batch.insert(&self.entries, id.to_be_bytes(), value);
        batch.insert(&self.by_original, original.as_bytes(), id.to_be_bytes());
        if !e164.is_empty() {
            batch.insert(&self.by_e164, Self::e164_key(e164, id), b"");
        }
        batch.insert(&self.settings, NEXT_ID_KEY, (id + 1).to_be_bytes());
        batch.commit()?;

        Ok(EntryId::from_u64(id))
    }

    fn delete(&self, selection: &Selection) -> Result<usize, StoreError> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        let doomed: Vec<PersistedEntry> = self
            .scan()?
            .into_iter()
            .filter(|p| selection.matches(&BlockedEntry::from(p.clone())))
            .collect();

        if doomed.is_empty() {
            return Ok(0);
        }

        let mut batch = self.keyspace.batch();
        for p in &doomed {
            batch.remove(&self.entries, p.id.to_be_bytes());
            batch.remove(&self.by_original, p.original_number.as_bytes());
            if !p.e164_number.is_empty() {
                batch.remove(&self.by_e164, Self::e164_key(&p.e164_number, p.id));
            }
        }
        batch.commit()?;

        Ok(doomed.len())
    }

    fn exists(&self, original: &str, e164: &str) -> Result<bool, StoreError> {
        // over-long values can never have been stored
        if original.len() <= MAX_KEY_LEN && self.by_original.contains_key(original.as_bytes())? {
            return Ok(true);
        }
        if e164.is_empty() || e164.len() + 1 > MAX_KEY_LEN {
            return Ok(false);
        }

        let mut prefix = e164.as_bytes().to_vec();
        prefix.push(0);
        match self.by_e164.prefix(prefix).next() {
            Some(item) => {
                item?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn select(&self, selection: &Selection) -> Result<Vec<BlockedEntry>, StoreError> {
        Ok(self
            .scan()?
            .into_iter()
            .map(BlockedEntry::from)
            .filter(|e| selection.matches(e))
            .collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.len()?)
    }
}

impl KeyValueStore for PersistentStorage {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let key = format!("bool_{}", key);
        match self.settings.get(key.as_bytes())? {
            Some(value) => match value.as_ref() {
                [0] => Ok(Some(false)),
                [1] => Ok(Some(true)),
                _ => Err(StoreError::Corrupt(format!("setting {}", key))),
            },
            None => Ok(None),
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        let key = format!("bool_{}", key);
        self.settings.insert(key.as_bytes(), [value as u8])?;
        Ok(())
    }

    fn get_i64(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let key = format!("int_{}", key);
        match self.settings.get(key.as_bytes())? {
            Some(value) => {
                let raw: [u8; 8] = value
                    .as_ref()
                    .try_into()
                    .map_err(|_| StoreError::Corrupt(format!("setting {}", key)))?;
                Ok(Some(i64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    fn set_i64(&self, key: &str, value: i64) -> Result<(), StoreError> {
        let key = format!("int_{}", key);
        self.settings.insert(key.as_bytes(), value.to_be_bytes())?;
        Ok(())
    }
}

impl Storage for PersistentStorage {
    fn backend_name(&self) -> &'static str {
        "fjall"
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}
