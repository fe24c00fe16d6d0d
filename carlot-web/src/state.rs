//! Shared application state

use crate::auth::users::UserStore;
use crate::cars::CarStore;
use crate::{database, WebError, WebResult};
use carlot_auth::{
    AccessGuard, CookiePolicy, PersistentSessionStore, SessionSigner, SqliteSessionRecordStore,
    TokenService,
};
use carlot_core::CarlotConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything handlers and middleware need; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CarlotConfig>,
    pub pool: SqlitePool,
    /// Session get/set/destroy over the `sessions` table
    pub sessions: Arc<PersistentSessionStore>,
    pub cookie_policy: Arc<CookiePolicy>,
    pub signer: Arc<SessionSigner>,
    pub tokens: Arc<TokenService>,
    pub guard: AccessGuard,
    pub users: UserStore,
    pub cars: CarStore,
}

impl AppState {
    /// Connect to the configured database and build the state
    pub async fn new(config: CarlotConfig) -> WebResult<Self> {
        let pool = database::connect(&config.database).await?;
        Self::with_pool(config, pool).await
    }

    /// Build the state over an existing pool, creating tables as needed.
    ///
    /// Fails when either signing secret is unusable, so a misconfigured
    /// process never serves authenticated routes.
    pub async fn with_pool(config: CarlotConfig, pool: SqlitePool) -> WebResult<Self> {
        database::create_tables(&pool).await?;

        let records = SqliteSessionRecordStore::new(pool.clone())
            .await
            .map_err(|e| WebError::Database(format!("Failed to prepare session table: {}", e)))?;

        let cookie_policy = CookiePolicy::from_config(&config.session);
        let sessions = Arc::new(PersistentSessionStore::new(
            Arc::new(records),
            cookie_policy.max_age,
        ));

        let tokens = Arc::new(
            TokenService::from_config(&config.token)
                .map_err(|e| WebError::Config(format!("Token service: {}", e)))?,
        );
        let signer = Arc::new(
            SessionSigner::new(config.session.secret.as_bytes())
                .map_err(|e| WebError::Config(format!("Session signer: {}", e)))?,
        );
        let guard = AccessGuard::new(sessions.clone(), tokens.clone());

        info!("Application state initialized");
        Ok(Self {
            config: Arc::new(config),
            users: UserStore::new(pool.clone()),
            cars: CarStore::new(pool.clone()),
            pool,
            sessions,
            cookie_policy: Arc::new(cookie_policy),
            signer,
            tokens,
            guard,
        })
    }

    /// Drop session rows past their expiry
    pub async fn purge_expired_sessions(&self) {
        match self.sessions.purge_expired().await {
            Ok(0) => debug!("No expired sessions to purge"),
            Ok(count) => info!("Purged {} expired sessions", count),
            Err(e) => warn!("Session purge failed: {}", e),
        }
    }
}
