//! Carlot Web Server
//!
//! User and vehicle records behind cookie sessions with an embedded signed
//! credential, checked per route by the access guard.

pub mod auth;
pub mod cars;
pub mod database;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;

// Re-export main types
pub use error::{ApiError, ApiJson, ApiResult};
pub use server::{CarlotServer, CarlotServerBuilder};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware, Router,
};
use carlot_core::CarlotError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_credentials(true)
        .allow_headers([ACCEPT, CONTENT_TYPE]);

    Router::new()
        .merge(routes::api_routes(&state))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CarlotError),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;
