//! Handler error type and its HTTP mapping

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use carlot_auth::{AuthError, StoreError};
use carlot_core::CarlotError;
use serde_json::json;
use tracing::{error, warn};

/// Message returned for every failed sign-in
pub const INVALID_CREDENTIALS_MESSAGE: &str = "User or password aren't valid";

/// Failures surfaced by request handlers and middleware
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body extractor whose rejections use the [`ApiError`] body
#[derive(FromRequest, Debug)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Auth(AuthError::StoreFailure(err))
    }
}

impl From<CarlotError> for ApiError {
    fn from(err: CarlotError) -> Self {
        match err {
            CarlotError::Validation { message, field, .. } => {
                ApiError::Validation { message, field }
            }
            other => {
                other.log();
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        error!("Database error: {}", err);
        ApiError::Internal("database error".to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(err) if err.is_forbidden() => StatusCode::FORBIDDEN,
            ApiError::Auth(err) if err.is_unauthenticated() => StatusCode::UNAUTHORIZED,
            ApiError::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Auth(err) => err.reason_code(),
            ApiError::Validation { .. } => "validation_failed",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Unprocessable(_) => "unprocessable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// Client-facing text; internal detail stays in the logs
    fn public_message(&self) -> String {
        match self {
            ApiError::Auth(AuthError::InvalidCredentials) => {
                INVALID_CREDENTIALS_MESSAGE.to_string()
            }
            ApiError::Auth(err) if err.is_unauthenticated() => "Unauthorized".to_string(),
            ApiError::Auth(err) if err.is_forbidden() => "Forbidden resource".to_string(),
            ApiError::Auth(_) | ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Unprocessable(message) => message.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else if status == StatusCode::FORBIDDEN {
            warn!(error = %self, "Request forbidden");
        }

        let mut body = json!({
            "ok": false,
            "error": self.code(),
            "message": self.public_message(),
            "statusCode": status.as_u16(),
        });
        if let ApiError::Validation {
            field: Some(field), ..
        } = &self
        {
            body["field"] = json!(field);
        }

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
