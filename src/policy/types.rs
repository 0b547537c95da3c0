//! Decision types with their stable integer codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a call is (not) blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    NotBlocked,
    BlockedInList,
    BlockedRestricted,
    BlockedUnknownNumber,
    BlockedPayphone,
    BlockedNotInContacts,
    BlockedUnavailable,
}

impl BlockReason {
    /// Stable status code.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotBlocked => 0,
            Self::BlockedInList => 1,
            Self::BlockedRestricted => 2,
            Self::BlockedUnknownNumber => 3,
            Self::BlockedPayphone => 4,
            Self::BlockedNotInContacts => 5,
            Self::BlockedUnavailable => 6,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::NotBlocked,
            1 => Self::BlockedInList,
            2 => Self::BlockedRestricted,
            3 => Self::BlockedUnknownNumber,
            4 => Self::BlockedPayphone,
            5 => Self::BlockedNotInContacts,
            6 => Self::BlockedUnavailable,
            _ => return None,
        })
    }

    pub fn is_blocked(&self) -> bool {
        !matches!(self, Self::NotBlocked)
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotBlocked => "not_blocked",
            Self::BlockedInList => "blocked_in_list",
            Self::BlockedRestricted => "blocked_restricted",
            Self::BlockedUnknownNumber => "blocked_unknown_number",
            Self::BlockedPayphone => "blocked_payphone",
            Self::BlockedNotInContacts => "blocked_not_in_contacts",
            Self::BlockedUnavailable => "blocked_unavailable",
        };
        f.write_str(s)
    }
}

/// How the caller's number was presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Presentation {
    Allowed,
    Restricted,
    Unknown,
    Payphone,
    Unavailable,
    /// Unrecognized code; never triggers a rule.
    Other(i32),
}

impl Presentation {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Allowed,
            2 => Self::Restricted,
            3 => Self::Unknown,
            4 => Self::Payphone,
            5 => Self::Unavailable,
            n => Self::Other(n),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Allowed => 1,
            Self::Restricted => 2,
            Self::Unknown => 3,
            Self::Payphone => 4,
            Self::Unavailable => 5,
            Self::Other(n) => *n,
        }
    }
}

/// Per-call facts supplied by the telephony stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallExtras {
    pub presentation: Presentation,
    pub contact_exists: bool,
}

impl CallExtras {
    pub fn new(presentation: Presentation, contact_exists: bool) -> Self {
        Self {
            presentation,
            contact_exists,
        }
    }
}
