//! Backend selection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::{StorageBackend, StoreConfig};

use super::{MemoryStorage, PersistentStorage, SharedStorage, StoreError};

/// Overrides the default data directory when no path is configured.
pub const DATA_DIR_ENV: &str = "BLOCKD_DATA_DIR";

const SYSTEM_DATA_DIR: &str = "/var/lib/blockd";

/// Where the fjall keyspace lives.
///
/// Precedence: configured path, then `BLOCKD_DATA_DIR`, then the system
/// directory for root, then the user's data directory.
pub(crate) fn resolve_data_dir(configured: Option<&Path>) -> PathBuf {
    let explicit = configured
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from));

    if let Some(path) = explicit {
        return absolutize(path);
    }

    if running_as_root() {
        return PathBuf::from(SYSTEM_DATA_DIR);
    }

    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .map(|base| base.join("blockd"))
        .unwrap_or_else(|| PathBuf::from("blockd-data"))
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    // SAFETY: getuid has no preconditions and cannot fail.
    unsafe { libc::getuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

/// Open the configured backend.
///
/// The returned handle serves both the block list and the settings keys.
pub fn create_storage(config: &StoreConfig) -> Result<SharedStorage, StoreError> {
    match config.backend {
        StorageBackend::Memory => {
            info!("block list is in memory and will not survive restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
        StorageBackend::Fjall => {
            let dir = resolve_data_dir(config.path.as_deref());
            std::fs::create_dir_all(&dir)?;
            info!(path = %dir.display(), "opening block list keyspace");
            let storage: SharedStorage = PersistentStorage::open(&dir)?;
            Ok(storage)
        }
    }
}
