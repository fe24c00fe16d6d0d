//! Configuration management
//!
//! Defaults, then an optional TOML file, then environment overrides.

use crate::error::{CarlotError, CarlotResult, ErrorContext};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum accepted length of the token signing secret, in bytes
pub const MIN_TOKEN_SECRET_LEN: usize = 16;

/// Longest accepted session cookie lifetime (ten years)
pub const MAX_SESSION_MAX_AGE_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Longest accepted credential validity (ten years)
pub const MAX_TOKEN_VALIDITY_DAYS: u32 = 10 * 365;

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CarlotConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub token: TokenConfig,
    pub roles: RoleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        }
    }
}

/// Session cookie policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Secret used to sign the session id carried in the cookie
    pub secret: String,
    pub cookie_name: String,
    /// Cookie lifetime; also the fallback record lifetime when a session
    /// carries no cookie expiry
    pub max_age_secs: u64,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    /// `Strict`, `Lax` or `None`
    pub same_site: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: "carlot.sid".to_string(),
            max_age_secs: 24 * 60 * 60,
            path: "/".to_string(),
            http_only: true,
            secure: false,
            same_site: Some("Lax".to_string()),
        }
    }
}

/// Signed credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub secret: String,
    pub validity_days: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            validity_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    /// Role assigned on sign-up
    pub default_role: i32,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self { default_role: 0 }
    }
}

impl CarlotConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CarlotResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CarlotError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        toml::from_str(&content).map_err(|e| CarlotError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> CarlotResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| CarlotError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| CarlotError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })
    }

    /// Apply overrides from process environment variables
    pub fn apply_env(&mut self) -> CarlotResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> CarlotResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CARLOT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CARLOT_PORT") {
            self.server.port = parse_number("CARLOT_PORT", &port)?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(secret) = lookup("SESSION_SECRET") {
            self.session.secret = secret;
        }
        if let Some(max_age) = lookup("SESSION_MAX_AGE_SECS") {
            self.session.max_age_secs = parse_number("SESSION_MAX_AGE_SECS", &max_age)?;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.token.secret = secret;
        }
        if let Some(days) = lookup("JWT_VALIDITY_DAYS") {
            self.token.validity_days = parse_number("JWT_VALIDITY_DAYS", &days)?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> CarlotResult<()> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "Port must be greater than 0"));
        }

        if self.session.secret.is_empty() {
            return Err(invalid(
                "session.secret",
                "Session secret must be set (SESSION_SECRET)",
            ));
        }

        if self.session.max_age_secs == 0 {
            return Err(invalid(
                "session.max_age_secs",
                "Session max age must be greater than 0",
            ));
        }

        if self.session.max_age_secs > MAX_SESSION_MAX_AGE_SECS {
            return Err(invalid(
                "session.max_age_secs",
                &format!(
                    "Session max age must not exceed {} seconds",
                    MAX_SESSION_MAX_AGE_SECS
                ),
            ));
        }

        if self.token.secret.len() < MIN_TOKEN_SECRET_LEN {
            return Err(invalid(
                "token.secret",
                &format!(
                    "Token secret must be at least {} bytes (JWT_SECRET)",
                    MIN_TOKEN_SECRET_LEN
                ),
            ));
        }

        if self.token.validity_days == 0 {
            return Err(invalid(
                "token.validity_days",
                "Token validity must be greater than 0",
            ));
        }

        if self.token.validity_days > MAX_TOKEN_VALIDITY_DAYS {
            return Err(invalid(
                "token.validity_days",
                &format!(
                    "Token validity must not exceed {} days",
                    MAX_TOKEN_VALIDITY_DAYS
                ),
            ));
        }

        if let Some(same_site) = &self.session.same_site {
            if !matches!(same_site.as_str(), "Strict" | "Lax" | "None") {
                return Err(invalid(
                    "session.same_site",
                    "SameSite must be one of Strict, Lax, None",
                ));
            }
        }

        Ok(())
    }

    /// Server bind address
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn invalid(field: &str, message: &str) -> CarlotError {
    CarlotError::Config {
        message: message.to_string(),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_metadata("field", field),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> CarlotResult<T> {
    value.trim().parse().map_err(|_| CarlotError::Config {
        message: format!("{} is not a valid number: {}", key, value),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("apply_env")
            .with_metadata("variable", key),
    })
}
