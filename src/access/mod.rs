//! Caller classification and per-operation gates.
//!
//! Every public operation is authorized exactly once through
//! [`AccessController::authorize`], which classifies the caller into a
//! [`Tier`] and checks user eligibility in the order its [`Gate`] demands.

mod identity;

pub use identity::{CallerIdentity, IdentityOracle, StaticIdentity, UserKind};

use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Permission level requested by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionLevel {
    Read,
    Write,
}

/// Capability tier a caller was admitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    SelfProcess,
    Root,
    Dialer,
    SmsWriter,
    CarrierPrivileged,
    SystemPermission(PermissionLevel),
    /// The operation requires no capability.
    Public,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfProcess => f.write_str("self"),
            Self::Root => f.write_str("root"),
            Self::Dialer => f.write_str("dialer"),
            Self::SmsWriter => f.write_str("sms_writer"),
            Self::CarrierPrivileged => f.write_str("carrier_privileged"),
            Self::SystemPermission(PermissionLevel::Read) => f.write_str("system_read"),
            Self::SystemPermission(PermissionLevel::Write) => f.write_str("system_write"),
            Self::Public => f.write_str("public"),
        }
    }
}

/// Check applied before an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Any tier with read access, then user eligibility.
    Read,
    /// Any tier with write access, then user eligibility.
    Write,
    /// User eligibility, then the explicit read permission only.
    SystemRead,
    /// User eligibility, then the explicit write permission only.
    SystemWrite,
    /// No check.
    Open,
}

/// Every operation the service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Query,
    IsBlocked,
    Insert,
    Update,
    Delete,
    Unblock,
    CanCurrentUserBlockNumbers,
    NotifyEmergencyContact,
    EndBlockSuppression,
    GetBlockSuppressionStatus,
    ShouldSystemBlockNumber,
    ShouldShowEmergencyCallNotification,
    GetEnhancedBlockSetting,
    SetEnhancedBlockSetting,
    /// A method name the service does not recognize.
    Unknown,
}

impl Operation {
    pub fn gate(&self) -> Gate {
        match self {
            Self::Query | Self::IsBlocked | Self::Unknown => Gate::Read,
            Self::Insert | Self::Update | Self::Delete | Self::Unblock => Gate::Write,
            Self::GetBlockSuppressionStatus
            | Self::ShouldSystemBlockNumber
            | Self::ShouldShowEmergencyCallNotification
            | Self::GetEnhancedBlockSetting => Gate::SystemRead,
            Self::NotifyEmergencyContact
            | Self::EndBlockSuppression
            | Self::SetEnhancedBlockSetting => Gate::SystemWrite,
            Self::CanCurrentUserBlockNumbers => Gate::Open,
        }
    }
}

/// Authorization failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("caller must be system, default dialer or default SMS app")]
    PermissionDenied,

    #[error("the current user cannot perform this operation")]
    UserNotPermitted,
}

/// Which users may manage the block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UserPolicy {
    /// Admit the main user in addition to the system user and managed profiles.
    #[serde(default = "default_true")]
    pub allow_main_user: bool,
}

fn default_true() -> bool {
    true
}

impl Default for UserPolicy {
    fn default() -> Self {
        Self {
            allow_main_user: true,
        }
    }
}

impl UserPolicy {
    pub fn is_eligible(&self, user: UserKind) -> bool {
        match user {
            UserKind::System | UserKind::ManagedProfile => true,
            UserKind::Main => self.allow_main_user,
            UserKind::Other => false,
        }
    }
}

/// Classifies callers and enforces gates.
#[derive(Debug, Clone, Copy)]
pub struct AccessController {
    allow_self_call: bool,
    users: UserPolicy,
}

impl Default for AccessController {
    fn default() -> Self {
        Self::new(true, UserPolicy::default())
    }
}

impl AccessController {
    /// `allow_self_call` lets the service's own process through as
    /// [`Tier::SelfProcess`]; tests turn it off to exercise the other tiers.
    pub fn new(allow_self_call: bool, users: UserPolicy) -> Self {
        Self {
            allow_self_call,
            users,
        }
    }

    /// Whether the caller's user may manage the block list.
    pub fn can_current_user_block(&self, identity: &CallerIdentity) -> bool {
        self.users.is_eligible(identity.user)
    }

    /// First tier the caller qualifies for at `level`, in precedence order.
    pub fn classify(&self, identity: &CallerIdentity, level: PermissionLevel) -> Option<Tier> {
        if self.allow_self_call && identity.is_self_process {
            return Some(Tier::SelfProcess);
        }
        if identity.is_root {
            return Some(Tier::Root);
        }
        if identity.is_default_or_system_dialer {
            return Some(Tier::Dialer);
        }
        if identity.has_sms_write_grant {
            return Some(Tier::SmsWriter);
        }
        if identity.has_carrier_privilege {
            return Some(Tier::CarrierPrivileged);
        }
        system_permission(identity, level)
    }

    /// Authorize one operation for the caller.
    pub fn authorize(
        &self,
        operation: Operation,
        identity: &CallerIdentity,
    ) -> Result<Tier, AuthError> {
        let result = match operation.gate() {
            Gate::Open => Ok(Tier::Public),
            Gate::Read => self.capability_then_user(identity, PermissionLevel::Read),
            Gate::Write => self.capability_then_user(identity, PermissionLevel::Write),
            Gate::SystemRead => self.user_then_system(identity, PermissionLevel::Read),
            Gate::SystemWrite => self.user_then_system(identity, PermissionLevel::Write),
        };

        match &result {
            Ok(tier) => debug!(?operation, tier = %tier, "caller authorized"),
            Err(e) => debug!(?operation, user = ?identity.user, error = %e, "caller rejected"),
        }
        result
    }

    fn capability_then_user(
        &self,
        identity: &CallerIdentity,
        level: PermissionLevel,
    ) -> Result<Tier, AuthError> {
        let tier = self
            .classify(identity, level)
            .ok_or(AuthError::PermissionDenied)?;
        if !self.can_current_user_block(identity) {
            return Err(AuthError::UserNotPermitted);
        }
        Ok(tier)
    }

    fn user_then_system(
        &self,
        identity: &CallerIdentity,
        level: PermissionLevel,
    ) -> Result<Tier, AuthError> {
        if !self.can_current_user_block(identity) {
            return Err(AuthError::UserNotPermitted);
        }
        system_permission(identity, level).ok_or(AuthError::PermissionDenied)
    }
}

fn system_permission(identity: &CallerIdentity, level: PermissionLevel) -> Option<Tier> {
    let granted = match level {
        PermissionLevel::Read => identity.read_permission,
        PermissionLevel::Write => identity.write_permission,
    };
    granted.then_some(Tier::SystemPermission(level))
}
