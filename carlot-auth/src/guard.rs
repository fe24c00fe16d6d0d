//! Per-request allow/deny decision for protected operations

use crate::error::{AuthError, AuthResult, DenialReason, TokenError};
use crate::role::{AuthorizationRequirement, Identity};
use crate::session::{SessionData, SessionStore};
use crate::token::{Credential, TokenService};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Verifies the credential embedded in a session
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Credential, TokenError>;
}

impl CredentialVerifier for TokenService {
    fn verify(&self, token: &str) -> Result<Credential, TokenError> {
        TokenService::verify(self, token)
    }
}

/// What the guard needs from the request being checked
pub trait RequestContext: Send {
    /// Opaque session id presented by the caller
    fn session_id(&self) -> Option<String>;

    /// Session already resolved by the HTTP layer, if any
    fn session(&self) -> Option<SessionData>;

    /// Slot for the verified caller
    fn attach_identity(&mut self, identity: Identity);

    /// Called after the guard destroyed the session
    fn session_invalidated(&mut self) {}
}

/// Composes session validity, credential validity and role requirements
#[derive(Clone)]
pub struct AccessGuard {
    sessions: Arc<dyn SessionStore>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl AccessGuard {
    pub fn new(sessions: Arc<dyn SessionStore>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { sessions, verifier }
    }

    /// Decide whether the caller behind `ctx` may run an operation declaring
    /// `requirement`. On success the identity is attached to `ctx`.
    ///
    /// An expired session is destroyed in the background; the denial does
    /// not wait for it.
    pub async fn check_auth<C>(
        &self,
        ctx: &mut C,
        requirement: &AuthorizationRequirement,
    ) -> AuthResult<Identity>
    where
        C: RequestContext + ?Sized,
    {
        let session_id = ctx.session_id();
        let session = match (ctx.session(), session_id.as_deref()) {
            (Some(session), _) => Some(session),
            (None, Some(id)) => {
                let loaded = self.sessions.get(id).await.map_err(|e| {
                    error!("Session lookup failed during access check: {}", e);
                    AuthError::StoreFailure(e)
                })?;
                if loaded.is_none() {
                    // Unknown or lapsed id; drop any leftover row
                    self.destroy_in_background(id.to_string());
                }
                loaded
            }
            (None, None) => None,
        };

        let decision = self.evaluate_at(
            session_id.as_deref(),
            session.as_ref(),
            requirement,
            Utc::now(),
        );

        match decision {
            Ok(identity) => {
                debug!(
                    user_id = identity.user_id,
                    role_id = identity.role_id.0,
                    "Access granted"
                );
                ctx.attach_identity(identity);
                Ok(identity)
            }
            Err(err) => {
                if matches!(err, AuthError::Unauthenticated(DenialReason::SessionExpired)) {
                    if let Some(id) = session_id {
                        self.destroy_in_background(id);
                    }
                    ctx.session_invalidated();
                }
                log_denial(&err);
                Err(err)
            }
        }
    }

    /// The decision steps without side effects, evaluated at `now`
    pub fn evaluate_at(
        &self,
        session_id: Option<&str>,
        session: Option<&SessionData>,
        requirement: &AuthorizationRequirement,
        now: DateTime<Utc>,
    ) -> AuthResult<Identity> {
        let (Some(_), Some(session)) = (session_id, session) else {
            return Err(AuthError::Unauthenticated(DenialReason::NoSession));
        };
        let Some(expires) = session.expires_at() else {
            return Err(AuthError::Unauthenticated(DenialReason::NoSession));
        };

        if now >= expires {
            return Err(AuthError::Unauthenticated(DenialReason::SessionExpired));
        }

        let Some(token) = session.credential() else {
            return Err(AuthError::Unauthenticated(DenialReason::MissingCredential));
        };

        let credential = self.verifier.verify(token)?;

        if !requirement.permits(credential.role_id) {
            return Err(AuthError::Forbidden {
                role: credential.role_id,
                allowed: requirement.allowed_roles().collect(),
            });
        }

        Ok(credential.identity())
    }

    fn destroy_in_background(&self, session_id: String) {
        let sessions = Arc::clone(&self.sessions);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sessions.destroy(&session_id).await {
                        warn!("Failed to destroy expired session: {}", e);
                    }
                });
            }
            Err(_) => warn!("No runtime available; expired session left for purge"),
        }
    }
}

fn log_denial(err: &AuthError) {
    match err {
        AuthError::Unauthenticated(DenialReason::SessionExpired)
        | AuthError::Unauthenticated(DenialReason::InvalidCredential(_)) => {
            warn!(reason = err.reason_code(), "Access denied")
        }
        AuthError::StoreFailure(_) => error!(reason = err.reason_code(), "Access check failed"),
        _ => debug!(reason = err.reason_code(), "Access denied"),
    }
}
