//! Enhanced blocking settings and the persisted suppression timestamp.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::store::{SharedStorage, StoreError};

/// Key holding the suppression expiry, in epoch milliseconds.
pub const SUPPRESSION_EXPIRY_KEY: &str = "block_suppression_expiry_time_pref";

/// Persisted value meaning "suppressed until explicitly ended".
pub const SUPPRESSED_FOREVER: i64 = -1;

/// Boolean settings governing enhanced call blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancedSetting {
    /// Block callers that are not in the contacts.
    BlockUnregistered,
    /// Block callers with a restricted presentation.
    BlockPrivate,
    /// Block payphones.
    BlockPayphone,
    /// Block unknown and unavailable callers.
    BlockUnknown,
    /// Show the "blocking disabled" notification after an emergency call.
    ShowEmergencyNotification,
}

impl EnhancedSetting {
    pub const ALL: [EnhancedSetting; 5] = [
        Self::BlockUnregistered,
        Self::BlockPrivate,
        Self::BlockPayphone,
        Self::BlockUnknown,
        Self::ShowEmergencyNotification,
    ];

    /// Persisted key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::BlockUnregistered => "block_numbers_not_in_contacts_setting",
            Self::BlockPrivate => "block_private_number_calls_setting",
            Self::BlockPayphone => "block_payphone_calls_setting",
            Self::BlockUnknown => "block_unknown_calls_setting",
            Self::ShowEmergencyNotification => "show_emergency_call_notification",
        }
    }

    /// Resolve a persisted key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    /// Whether this setting turns on a blocking rule.
    pub fn is_block_rule(&self) -> bool {
        !matches!(self, Self::ShowEmergencyNotification)
    }
}

impl fmt::Display for EnhancedSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Unknown setting key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown enhanced block setting: {0}")]
pub struct UnknownSetting(pub String);

impl FromStr for EnhancedSetting {
    type Err = UnknownSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| UnknownSetting(s.to_string()))
    }
}

/// Whether blocking is suspended after an emergency contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionState {
    NotSuppressed,
    /// Suppressed until the given epoch-millisecond instant.
    SuppressedUntil(i64),
    SuppressedForever,
}

impl SuppressionState {
    /// Decode the persisted expiry. Zero or absent means not suppressed.
    pub fn from_stored(value: Option<i64>) -> Self {
        match value {
            None | Some(0) => Self::NotSuppressed,
            Some(SUPPRESSED_FOREVER) => Self::SuppressedForever,
            Some(ts) => Self::SuppressedUntil(ts),
        }
    }

    /// Persisted expiry.
    pub fn to_stored(self) -> i64 {
        match self {
            Self::NotSuppressed => 0,
            Self::SuppressedUntil(ts) => ts,
            Self::SuppressedForever => SUPPRESSED_FOREVER,
        }
    }

    /// Whether blocking is suspended at `now_millis`.
    pub fn is_active(&self, now_millis: i64) -> bool {
        match self {
            Self::NotSuppressed => false,
            Self::SuppressedForever => true,
            Self::SuppressedUntil(ts) => now_millis < *ts,
        }
    }
}

/// Typed access to settings over the shared key/value store.
#[derive(Clone)]
pub struct SettingsStore {
    storage: SharedStorage,
}

impl SettingsStore {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Read a setting; absent means disabled.
    pub fn get_bool(&self, setting: EnhancedSetting) -> Result<bool, StoreError> {
        Ok(self.storage.get_bool(setting.key())?.unwrap_or(false))
    }

    pub fn set_bool(&self, setting: EnhancedSetting, value: bool) -> Result<(), StoreError> {
        tracing::debug!(setting = %setting, value, "enhanced setting written");
        self.storage.set_bool(setting.key(), value)
    }

    pub fn suppression_state(&self) -> Result<SuppressionState, StoreError> {
        Ok(SuppressionState::from_stored(
            self.storage.get_i64(SUPPRESSION_EXPIRY_KEY)?,
        ))
    }

    pub fn set_suppression_state(&self, state: SuppressionState) -> Result<(), StoreError> {
        self.storage.set_i64(SUPPRESSION_EXPIRY_KEY, state.to_stored())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;
    use std::sync::Arc;

    #[test]
    fn test_setting_keys_roundtrip() {
        for setting in EnhancedSetting::ALL {
            assert_eq!(EnhancedSetting::from_key(setting.key()), Some(setting));
        }
        assert!("block_everything".parse::<EnhancedSetting>().is_err());
        assert!(!EnhancedSetting::ShowEmergencyNotification.is_block_rule());
    }

    #[test]
    fn test_suppression_encoding() {
        assert_eq!(SuppressionState::from_stored(None), SuppressionState::NotSuppressed);
        assert_eq!(SuppressionState::from_stored(Some(0)), SuppressionState::NotSuppressed);
        assert_eq!(
            SuppressionState::from_stored(Some(-1)),
            SuppressionState::SuppressedForever
        );
        assert_eq!(SuppressionState::SuppressedUntil(42).to_stored(), 42);
    }

    #[test]
    fn test_suppression_activity() {
        assert!(SuppressionState::SuppressedForever.is_active(i64::MAX));
        assert!(SuppressionState::SuppressedUntil(1000).is_active(999));
        assert!(!SuppressionState::SuppressedUntil(1000).is_active(1000));
        assert!(!SuppressionState::NotSuppressed.is_active(0));
    }

    #[test]
    fn test_settings_default_false() {
        let settings = SettingsStore::new(Arc::new(MemoryStorage::new()));
        assert!(!settings.get_bool(EnhancedSetting::BlockPayphone).unwrap());

        settings.set_bool(EnhancedSetting::BlockPayphone, true).unwrap();
        assert!(settings.get_bool(EnhancedSetting::BlockPayphone).unwrap());
        assert!(!settings.get_bool(EnhancedSetting::BlockPrivate).unwrap());
    }

    #[test]
    fn test_suppression_state_persisted() {
        let settings = SettingsStore::new(Arc::new(MemoryStorage::new()));
        assert_eq!(settings.suppression_state().unwrap(), SuppressionState::NotSuppressed);

        settings
            .set_suppression_state(SuppressionState::SuppressedUntil(5_000))
            .unwrap();
        assert_eq!(
            settings.suppression_state().unwrap(),
            SuppressionState::SuppressedUntil(5_000)
        );
    }
}
