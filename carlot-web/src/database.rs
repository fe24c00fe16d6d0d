//! SQLite pool and schema for users and cars

use crate::{WebError, WebResult};
use carlot_core::DatabaseConfig;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use tracing::{debug, error, info};

/// Open the pool described by `config`.
///
/// In-memory databases live as long as their connection, so they get a
/// single connection that is never recycled.
pub async fn connect(config: &DatabaseConfig) -> WebResult<SqlitePool> {
    info!("Connecting to database: {}", config.url);

    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| WebError::Database(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if config.url.contains(":memory:") {
        debug!("Using a single pinned connection for in-memory database");
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections)
    };

    let pool = pool_options.connect_with(options).await.map_err(|e| {
        error!("Database connection failed: {}", e);
        WebError::Database(format!("Failed to connect to database: {}", e))
    })?;

    info!("Database connection established");
    Ok(pool)
}

/// Create the user and car tables if missing
pub async fn create_tables(pool: &SqlitePool) -> WebResult<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            password TEXT NOT NULL,
            phone TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            role_id INTEGER NOT NULL,
            date_create TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS cars (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            brand TEXT NOT NULL,
            model TEXT NOT NULL,
            production_year INTEGER NOT NULL,
            user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
            date_create TEXT NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_cars_user_id ON cars(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_cars_brand ON cars(brand)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            error!("Failed to create tables: {}", e);
            WebError::Database(format!("Failed to create tables: {}", e))
        })?;
    }

    info!("Database tables ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_schema() {
        let pool = connect(&DatabaseConfig::default()).await.unwrap();
        create_tables(&pool).await.unwrap();
        // Idempotent
        create_tables(&pool).await.unwrap();

        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'cars')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count.0, 2);
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carlot.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 2,
        };

        let pool = connect(&config).await.unwrap();
        create_tables(&pool).await.unwrap();
        assert!(path.exists());
    }
}
