//! Carlot Web Server
//!
//! Binds the listener, runs the expired-session sweep and serves the router.

use crate::{create_app, AppState, WebError, WebResult};
use axum::serve;
use carlot_core::CarlotConfig;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

pub struct CarlotServer {
    config: CarlotConfig,
    state: AppState,
}

impl CarlotServer {
    /// Validate `config` and build the application state
    pub async fn new(config: CarlotConfig) -> WebResult<Self> {
        config.validate()?;
        let state = AppState::new(config.clone()).await?;

        Ok(Self { config, state })
    }

    /// Serve until the listener fails
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();
        info!("Starting carlot server on http://{}", address);

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        let purge_state = self.state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
            loop {
                interval.tick().await;
                purge_state.purge_expired_sessions().await;
            }
        });

        if let Err(e) = serve(listener, app).await {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        Ok(())
    }

    pub fn config(&self) -> &CarlotConfig {
        &self.config
    }
}

/// Builder for [`CarlotServer`]
pub struct CarlotServerBuilder {
    config: CarlotConfig,
}

impl CarlotServerBuilder {
    pub fn new() -> Self {
        Self {
            config: CarlotConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn config(mut self, config: CarlotConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.database.url = database_url.into();
        self
    }

    pub async fn build(self) -> WebResult<CarlotServer> {
        CarlotServer::new(self.config).await
    }
}

impl Default for CarlotServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
