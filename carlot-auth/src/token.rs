//! Signed, time-limited credentials (HS256 JWT)

use crate::error::{AuthError, AuthResult, TokenError};
use crate::role::{Identity, RoleId};
use carlot_core::{TokenConfig, MAX_TOKEN_VALIDITY_DAYS};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Claims carried by a credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub user_id: i64,
    pub role_id: RoleId,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration time (unix seconds)
    pub exp: i64,
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            role_id: self.role_id,
        }
    }
}

/// Issues and verifies credentials with a process-wide key supplied at
/// construction.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    validity: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a service signing with `secret`.
    ///
    /// An empty secret or a non-positive validity is refused: issuing tokens
    /// nobody can meaningfully verify is worse than not starting.
    pub fn new(secret: &[u8], validity: Duration) -> AuthResult<Self> {
        if secret.is_empty() {
            return Err(AuthError::TokenSigning(
                "signing secret is empty".to_string(),
            ));
        }
        if validity <= Duration::zero() {
            return Err(AuthError::TokenSigning(
                "token validity must be positive".to_string(),
            ));
        }
        if validity > Duration::days(i64::from(MAX_TOKEN_VALIDITY_DAYS)) {
            return Err(AuthError::TokenSigning(format!(
                "token validity must not exceed {} days",
                MAX_TOKEN_VALIDITY_DAYS
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            validity,
        })
    }

    pub fn from_config(config: &TokenConfig) -> AuthResult<Self> {
        Self::new(
            config.secret.as_bytes(),
            Duration::days(i64::from(config.validity_days)),
        )
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Mint a credential valid from now for the configured window
    pub fn issue(&self, user_id: i64, role_id: RoleId) -> AuthResult<String> {
        self.issue_at(user_id, role_id, Utc::now())
    }

    /// Mint a credential whose window starts at `issued_at`
    pub fn issue_at(
        &self,
        user_id: i64,
        role_id: RoleId,
        issued_at: DateTime<Utc>,
    ) -> AuthResult<String> {
        let expires_at = issued_at
            .checked_add_signed(self.validity)
            .ok_or_else(|| {
                AuthError::TokenSigning("credential expiry is out of range".to_string())
            })?;
        let claims = Credential {
            user_id,
            role_id,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            warn!("Failed to encode credential: {}", e);
            AuthError::TokenSigning(e.to_string())
        })
    }

    /// Check signature and validity window
    pub fn verify(&self, token: &str) -> Result<Credential, TokenError> {
        let data = decode::<Credential>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!("Credential verification failed: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }
        })?;

        let credential = data.claims;
        if credential.is_expired_at(Utc::now()) {
            return Err(TokenError::Expired);
        }

        Ok(credential)
    }
}
