//! Authentication error taxonomy

use crate::role::RoleId;
use thiserror::Error;

/// Why a signed credential was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token signature mismatch")]
    InvalidSignature,
    #[error("token malformed")]
    Malformed,
}

/// Why the guard refused an unauthenticated caller
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    #[error("no session")]
    NoSession,
    #[error("session expired")]
    SessionExpired,
    #[error("session carries no credential")]
    MissingCredential,
    #[error("credential rejected: {0}")]
    InvalidCredential(TokenError),
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::NoSession => "no_session",
            DenialReason::SessionExpired => "session_expired",
            DenialReason::MissingCredential => "missing_credential",
            DenialReason::InvalidCredential(_) => "invalid_credential",
        }
    }
}

/// Session persistence failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Authentication and authorization errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(DenialReason),

    #[error("Role {role} is not allowed for this operation")]
    Forbidden { role: RoleId, allowed: Vec<RoleId> },

    /// Sign-in failure; deliberately says nothing about which field was wrong
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session store failure: {0}")]
    StoreFailure(#[from] StoreError),

    #[error("Token signing failure: {0}")]
    TokenSigning(String),
}

impl AuthError {
    /// Stable machine-readable code, safe to show to clients
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated(reason) => reason.code(),
            AuthError::Forbidden { .. } => "forbidden",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::StoreFailure(_) => "store_failure",
            AuthError::TokenSigning(_) => "token_signing_failed",
        }
    }

    /// Recoverable by signing in again
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::Unauthenticated(_) | AuthError::InvalidCredentials
        )
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthError::Forbidden { .. })
    }

    /// Server-side failure rather than a decision about the caller
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::StoreFailure(_) | AuthError::TokenSigning(_))
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::Unauthenticated(DenialReason::InvalidCredential(err))
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_distinct() {
        let errors = [
            AuthError::Unauthenticated(DenialReason::NoSession),
            AuthError::Unauthenticated(DenialReason::SessionExpired),
            AuthError::Unauthenticated(DenialReason::MissingCredential),
            AuthError::from(TokenError::Expired),
            AuthError::Forbidden {
                role: RoleId(1),
                allowed: vec![RoleId(0)],
            },
            AuthError::StoreFailure(StoreError::from(
                serde_json::from_str::<u8>("not json").unwrap_err(),
            )),
        ];

        let codes: std::collections::HashSet<_> =
            errors.iter().map(|e| e.reason_code()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_classification() {
        assert!(AuthError::from(TokenError::InvalidSignature).is_unauthenticated());
        assert!(AuthError::Forbidden {
            role: RoleId(2),
            allowed: vec![]
        }
        .is_forbidden());
        assert!(AuthError::TokenSigning("empty key".into()).is_internal());
        assert!(!AuthError::InvalidCredentials.is_internal());
    }
}
