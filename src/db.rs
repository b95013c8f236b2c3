//! Database module
//!
//! Pool construction and schema utilities.

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

use crate::config::{Config, ConfigError};

/// Initial schema, kept as raw SQL under migrations/
pub const INIT_SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// Tables the ledger cannot run without
const REQUIRED_TABLES: &[&str] = &["users", "accounts", "entries", "transfers"];

/// Open a connection pool from configuration
pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await?;

    Ok(pool)
}

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the initial schema. Idempotent.
pub async fn apply_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Multi-statement text goes through the simple query protocol.
    pool.execute(INIT_SCHEMA).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creates_every_required_table() {
        for table in REQUIRED_TABLES {
            let ddl = format!("CREATE TABLE IF NOT EXISTS {} (", table);
            assert!(INIT_SCHEMA.contains(&ddl), "missing DDL for {}", table);
        }
    }
}
