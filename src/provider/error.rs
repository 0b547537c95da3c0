use thiserror::Error;

use crate::access::AuthError;
use crate::store::{FilterError, StoreError};

/// Failure of a public operation. Every variant is terminal.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing required field or a caller-supplied derived column.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed or unsafe filter expression.
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    #[error("permission denied: {0}")]
    PermissionDenied(AuthError),

    #[error("user not permitted: {0}")]
    UserNotPermitted(AuthError),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// Unknown method or route.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<AuthError> for ProviderError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::PermissionDenied => Self::PermissionDenied(e),
            AuthError::UserNotPermitted => Self::UserNotPermitted(e),
        }
    }
}

impl ProviderError {
    /// Short machine-readable kind, reported in the CLI error output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::InvalidFilter(_) => "invalid_filter",
            Self::PermissionDenied(_) => "permission_denied",
            Self::UserNotPermitted(_) => "user_not_permitted",
            Self::UnsupportedOperation(_) => "unsupported_operation",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage",
        }
    }

    pub fn is_security(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::UserNotPermitted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_mapping() {
        let denied = ProviderError::from(AuthError::PermissionDenied);
        assert_eq!(denied.kind(), "permission_denied");
        assert!(denied.is_security());

        let user = ProviderError::from(AuthError::UserNotPermitted);
        assert!(matches!(user, ProviderError::UserNotPermitted(_)));
        assert!(user.to_string().contains("current user"));
    }
}
