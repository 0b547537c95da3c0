//! Block list backup and restore.
//!
//! A backup is a JSON document with a `version` header followed by the
//! entries in id order. Restore reads the header first and refuses any
//! version newer than [`BACKUP_VERSION`] without touching the store.
//! Restored entries are upserted by original number, so restoring twice
//! leaves one row per number.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::notify::{ChangeEvent, ChangeNotifier, SharedNotifier};
use crate::number::{pii_handle, MAX_NUMBER_LEN};
use crate::store::{Selection, SharedStorage, StoreError};

/// Format version written by this build.
pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("malformed backup: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// One backed-up entry. Ids are not carried over; restore assigns new ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub original_number: String,
    #[serde(default)]
    pub e164_number: String,
}

/// Full backup document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub version: u32,
    #[serde(default)]
    pub entries: Vec<BackupRecord>,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

/// Outcome of a restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub restored: usize,
    /// Records with an empty or over-long original number
    pub skipped: usize,
}

/// Produces and applies backups, and tracks whether the list changed since
/// the last backup.
///
/// The agent is itself a [`ChangeNotifier`]: install it as the provider's
/// notifier and it records list changes before forwarding every event to
/// the notifier it wraps.
pub struct BackupAgent {
    storage: SharedStorage,
    notifier: SharedNotifier,
    pending: AtomicBool,
    restored: AtomicUsize,
}

impl BackupAgent {
    pub fn new(storage: SharedStorage, notifier: SharedNotifier) -> Self {
        Self {
            storage,
            notifier,
            pending: AtomicBool::new(false),
            restored: AtomicUsize::new(0),
        }
    }

    /// Current block list as a snapshot.
    pub fn snapshot(&self) -> Result<BackupSnapshot, StoreError> {
        let entries = self
            .storage
            .select(&Selection::All)?
            .into_iter()
            .map(|e| BackupRecord {
                original_number: e.original_number,
                e164_number: e.e164_number,
            })
            .collect();
        Ok(BackupSnapshot {
            version: BACKUP_VERSION,
            entries,
        })
    }

    /// Serialize the block list and clear the pending flag.
    pub fn backup(&self) -> Result<Vec<u8>, BackupError> {
        self.pending.store(false, Ordering::SeqCst);
        let snapshot = self.snapshot()?;
        let data = serde_json::to_vec_pretty(&snapshot)?;
        info!(entries = snapshot.entries.len(), bytes = data.len(), "block list backed up");
        Ok(data)
    }

    /// Apply a backup produced by [`BackupAgent::backup`].
    pub fn restore(&self, data: &[u8]) -> Result<RestoreReport, BackupError> {
        let header: VersionHeader = serde_json::from_slice(data)?;
        if header.version > BACKUP_VERSION {
            warn!(
                found = header.version,
                supported = BACKUP_VERSION,
                "refusing backup from a newer version"
            );
            return Err(BackupError::UnsupportedVersion {
                found: header.version,
                supported: BACKUP_VERSION,
            });
        }

        let snapshot: BackupSnapshot = serde_json::from_slice(data)?;
        let mut report = RestoreReport::default();
        for record in &snapshot.entries {
            let original = record.original_number.as_str();
            if original.is_empty() || original.len() > MAX_NUMBER_LEN {
                debug!(number = %pii_handle(original), "skipping unusable backup record");
                report.skipped += 1;
                continue;
            }
            self.storage.insert(original, &record.e164_number)?;
            report.restored += 1;
        }

        self.restored.fetch_add(report.restored, Ordering::SeqCst);
        if report.restored > 0 {
            self.notify(ChangeEvent::BlockedNumbersChanged);
        }
        info!(
            version = snapshot.version,
            restored = report.restored,
            skipped = report.skipped,
            "block list restored"
        );
        Ok(report)
    }

    /// Rows restored over this agent's lifetime.
    pub fn restored_count(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }

    /// Whether the block list changed since the last backup.
    pub fn needs_backup(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }
}

impl ChangeNotifier for BackupAgent {
    fn notify(&self, event: ChangeEvent) {
        if event == ChangeEvent::BlockedNumbersChanged {
            self.pending.store(true, Ordering::SeqCst);
        }
        self.notifier.notify(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopNotifier;
    use crate::store::{BlockListStore, MemoryStorage};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<ChangeEvent>>);

    impl ChangeNotifier for RecordingNotifier {
        fn notify(&self, event: ChangeEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn agent() -> (BackupAgent, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (BackupAgent::new(storage.clone(), Arc::new(NoopNotifier)), storage)
    }

    #[test]
    fn test_backup_then_restore_into_empty_store() {
        let (source, storage) = agent();
        storage.insert("+1-555-0100", "+15550100").unwrap();
        storage.insert("private", "").unwrap();
        let data = source.backup().unwrap();

        let (target, restored_into) = agent();
        let report = target.restore(&data).unwrap();
        assert_eq!(report, RestoreReport { restored: 2, skipped: 0 });
        assert_eq!(target.restored_count(), 2);
        assert!(restored_into.exists("", "+15550100").unwrap());
        assert!(restored_into.exists("private", "").unwrap());

        // restoring again upserts instead of duplicating
        target.restore(&data).unwrap();
        assert_eq!(restored_into.count().unwrap(), 2);
    }

    #[test]
    fn test_restore_from_higher_version_restores_nothing() {
        let (agent, storage) = agent();
        let data = format!(
            r#"{{"version": {}, "entries": [{{"original_number": "5550100"}}]}}"#,
            BACKUP_VERSION + 9999
        );

        let err = agent.restore(data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            BackupError::UnsupportedVersion { found, supported: BACKUP_VERSION }
                if found == BACKUP_VERSION + 9999
        ));
        assert_eq!(agent.restored_count(), 0);
        assert_eq!(storage.count().unwrap(), 0);
    }

    #[test]
    fn test_newer_version_refused_even_with_unknown_layout() {
        let (agent, storage) = agent();
        let err = agent
            .restore(br#"{"version": 2, "rows": {"a": 1}}"#)
            .unwrap_err();
        assert!(matches!(err, BackupError::UnsupportedVersion { found: 2, .. }));
        assert_eq!(storage.count().unwrap(), 0);
    }

    #[test]
    fn test_unusable_records_skipped() {
        let (agent, storage) = agent();
        let snapshot = BackupSnapshot {
            version: BACKUP_VERSION,
            entries: vec![
                BackupRecord {
                    original_number: String::new(),
                    e164_number: String::new(),
                },
                BackupRecord {
                    original_number: "9".repeat(MAX_NUMBER_LEN + 1),
                    e164_number: String::new(),
                },
                BackupRecord {
                    original_number: "5550100".to_string(),
                    e164_number: "+15550100".to_string(),
                },
            ],
        };

        let report = agent
            .restore(&serde_json::to_vec(&snapshot).unwrap())
            .unwrap();
        assert_eq!(report, RestoreReport { restored: 1, skipped: 2 });
        assert_eq!(storage.count().unwrap(), 1);
    }

    #[test]
    fn test_malformed_backup_rejected() {
        let (agent, _) = agent();
        assert!(matches!(
            agent.restore(b"not json"),
            Err(BackupError::Malformed(_))
        ));
        assert!(matches!(
            agent.restore(br#"{"entries": []}"#),
            Err(BackupError::Malformed(_))
        ));
    }

    #[test]
    fn test_change_events_mark_backup_pending() {
        let (agent, _) = agent();
        assert!(!agent.needs_backup());

        agent.notify(ChangeEvent::SuppressionStateChanged);
        assert!(!agent.needs_backup());

        agent.notify(ChangeEvent::BlockedNumbersChanged);
        assert!(agent.needs_backup());

        agent.backup().unwrap();
        assert!(!agent.needs_backup());
    }

    #[test]
    fn test_events_forwarded_to_wrapped_notifier() {
        let notifier = Arc::new(RecordingNotifier::default());
        let agent = BackupAgent::new(Arc::new(MemoryStorage::new()), notifier.clone());

        agent.notify(ChangeEvent::SuppressionStateChanged);
        agent.notify(ChangeEvent::BlockedNumbersChanged);
        assert_eq!(
            *notifier.0.lock().unwrap(),
            vec![
                ChangeEvent::SuppressionStateChanged,
                ChangeEvent::BlockedNumbersChanged
            ]
        );
    }

    #[test]
    fn test_restore_announces_list_change() {
        let storage = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let agent = BackupAgent::new(storage, notifier.clone());

        let empty = serde_json::to_vec(&BackupSnapshot {
            version: BACKUP_VERSION,
            entries: Vec::new(),
        })
        .unwrap();
        agent.restore(&empty).unwrap();
        assert!(notifier.0.lock().unwrap().is_empty());

        agent
            .restore(br#"{"version": 1, "entries": [{"original_number": "112233"}]}"#)
            .unwrap();
        assert_eq!(
            *notifier.0.lock().unwrap(),
            vec![ChangeEvent::BlockedNumbersChanged]
        );
    }
}
