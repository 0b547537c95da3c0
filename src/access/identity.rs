//! Caller identity as reported by the host platform.

use serde::Deserialize;

/// Which user the caller runs as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    /// The system user.
    #[default]
    System,
    /// The main (primary human) user.
    Main,
    /// A work profile managed on behalf of another user.
    ManagedProfile,
    /// Any secondary or guest user.
    Other,
}

/// Capability facts about the current caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CallerIdentity {
    /// Caller is this process.
    pub is_self_process: bool,
    /// Caller runs with the unrestricted identity.
    pub is_root: bool,
    /// Caller is the default or system dialer.
    pub is_default_or_system_dialer: bool,
    /// Caller holds the SMS-write operation grant.
    pub has_sms_write_grant: bool,
    /// Caller has carrier privilege on any radio.
    pub has_carrier_privilege: bool,
    /// Caller holds the read-blocked-numbers permission.
    pub read_permission: bool,
    /// Caller holds the write-blocked-numbers permission.
    pub write_permission: bool,
    pub user: UserKind,
}

impl CallerIdentity {
    /// The service calling into itself. It holds its own permissions.
    pub fn self_process() -> Self {
        Self {
            is_self_process: true,
            read_permission: true,
            write_permission: true,
            ..Default::default()
        }
    }

    /// An ordinary app on the system user with no grants.
    pub fn unprivileged() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: UserKind) -> Self {
        self.user = user;
        self
    }

    pub fn with_permissions(mut self, read: bool, write: bool) -> Self {
        self.read_permission = read;
        self.write_permission = write;
        self
    }
}

/// Reports who is calling.
pub trait IdentityOracle: Send + Sync {
    fn current_caller(&self) -> CallerIdentity;
}

/// Always reports the same identity.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub CallerIdentity);

impl IdentityOracle for StaticIdentity {
    fn current_caller(&self) -> CallerIdentity {
        self.0.clone()
    }
}
