//! Carlot Web Server

use anyhow::Context;
use carlot_core::{init_logging, CarlotConfig};
use carlot_web::server::CarlotServerBuilder;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Carlot - session-authenticated user and vehicle records
#[derive(Parser, Debug)]
#[command(name = "carlot")]
#[command(about = "HTTP service for users and their cars")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL (users, cars and sessions)
    #[arg(long)]
    database_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Layer the command line over file and environment settings
    fn load_config(&self) -> anyhow::Result<CarlotConfig> {
        let mut config = match &self.config {
            Some(path) => CarlotConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => CarlotConfig::default(),
        };
        config.apply_env()?;

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging = config.logging.with_level(level);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = args.load_config()?;

    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Failed to set up logging: {}", e))?;

    config.validate().context("Invalid configuration")?;
    info!(database = %config.database.url, "Configuration loaded");

    let server = CarlotServerBuilder::new().config(config).build().await?;
    server.start().await?;

    Ok(())
}
