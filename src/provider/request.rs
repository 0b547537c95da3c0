//! Request and response shapes for the provider surface.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::ProviderError;
use crate::access::Operation;
use crate::policy::{CallExtras, Presentation};
use crate::store::{Column, EntryId};

/// Addressable collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// `blocked`: the whole list.
    List,
    /// `blocked/<id>`: one entry.
    Entry(EntryId),
}

impl Target {
    pub fn parse(route: &str) -> Result<Self, ProviderError> {
        let route = route.trim_matches('/');
        let mut parts = route.splitn(2, '/');
        match (parts.next(), parts.next()) {
            (Some("blocked"), None) => Ok(Self::List),
            (Some("blocked"), Some(id)) => id
                .parse::<u64>()
                .map(|id| Self::Entry(EntryId::from_u64(id)))
                .map_err(|_| ProviderError::NotFound(format!("unsupported route: {}", route))),
            _ => Err(ProviderError::NotFound(format!("unsupported route: {}", route))),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => f.write_str("blocked"),
            Self::Entry(id) => write!(f, "blocked/{}", id),
        }
    }
}

/// Named methods reachable through [`super::BlockedNumberProvider::call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    IsBlocked,
    CanCurrentUserBlockNumbers,
    Unblock,
    NotifyEmergencyContact,
    EndBlockSuppression,
    GetBlockSuppressionStatus,
    ShouldSystemBlockNumber,
    ShouldShowEmergencyCallNotification,
    GetEnhancedBlockSetting,
    SetEnhancedBlockSetting,
}

impl Method {
    pub const ALL: [Method; 10] = [
        Self::IsBlocked,
        Self::CanCurrentUserBlockNumbers,
        Self::Unblock,
        Self::NotifyEmergencyContact,
        Self::EndBlockSuppression,
        Self::GetBlockSuppressionStatus,
        Self::ShouldSystemBlockNumber,
        Self::ShouldShowEmergencyCallNotification,
        Self::GetEnhancedBlockSetting,
        Self::SetEnhancedBlockSetting,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::IsBlocked => "is_blocked",
            Self::CanCurrentUserBlockNumbers => "can_current_user_block_numbers",
            Self::Unblock => "unblock",
            Self::NotifyEmergencyContact => "notify_emergency_contact",
            Self::EndBlockSuppression => "end_block_suppression",
            Self::GetBlockSuppressionStatus => "get_block_suppression_status",
            Self::ShouldSystemBlockNumber => "should_system_block_number",
            Self::ShouldShowEmergencyCallNotification => "should_show_emergency_call_notification",
            Self::GetEnhancedBlockSetting => "get_enhanced_block_setting",
            Self::SetEnhancedBlockSetting => "set_enhanced_block_setting",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::IsBlocked => Operation::IsBlocked,
            Self::CanCurrentUserBlockNumbers => Operation::CanCurrentUserBlockNumbers,
            Self::Unblock => Operation::Unblock,
            Self::NotifyEmergencyContact => Operation::NotifyEmergencyContact,
            Self::EndBlockSuppression => Operation::EndBlockSuppression,
            Self::GetBlockSuppressionStatus => Operation::GetBlockSuppressionStatus,
            Self::ShouldSystemBlockNumber => Operation::ShouldSystemBlockNumber,
            Self::ShouldShowEmergencyCallNotification => {
                Operation::ShouldShowEmergencyCallNotification
            }
            Self::GetEnhancedBlockSetting => Operation::GetEnhancedBlockSetting,
            Self::SetEnhancedBlockSetting => Operation::SetEnhancedBlockSetting,
        }
    }
}

/// Column values for an insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentValues {
    values: BTreeMap<String, String>,
}

impl ContentValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values holding only an original number.
    pub fn with_original(number: impl Into<String>) -> Self {
        let mut values = Self::new();
        values.put(Column::OriginalNumber.name(), number);
        values
    }

    pub fn put(&mut self, column: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Optional arguments accompanying a named method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArgs {
    /// Presentation code of the incoming call.
    pub presentation: Option<i32>,
    /// Whether the caller is a saved contact.
    pub contact_exists: Option<bool>,
    /// Enhanced setting key.
    pub setting_key: Option<String>,
    /// Enhanced setting value.
    pub setting_value: Option<bool>,
}

impl CallArgs {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Per-call facts, present when any were supplied.
    pub fn call_extras(&self) -> Option<CallExtras> {
        if self.presentation.is_none() && self.contact_exists.is_none() {
            return None;
        }
        Some(CallExtras::new(
            Presentation::from_code(self.presentation.unwrap_or(0)),
            self.contact_exists.unwrap_or(false),
        ))
    }

    pub fn setting(key: impl Into<String>) -> Self {
        Self {
            setting_key: Some(key.into()),
            ..Default::default()
        }
    }
}

/// Result of a named method. Only the fields the method produces are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_blocked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_status: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_block: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_deleted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_suppressed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppressed_until: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_emergency_notification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setting_enabled: Option<bool>,
}
