//! Authentication endpoints and the verified-caller extractor

pub mod handlers;
pub mod users;

use crate::error::ApiError;
use axum::{extract::FromRequestParts, http::request::Parts};
use carlot_auth::{AuthError, DenialReason, Identity};

/// Caller verified by the access guard for this request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Identity);

impl CurrentUser {
    pub fn user_id(&self) -> i64 {
        self.0.user_id
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only present on routes registered behind the guard
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or(ApiError::Auth(AuthError::Unauthenticated(
                DenialReason::NoSession,
            )))
    }
}
