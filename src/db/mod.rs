//! Database layer
//!
//! This module handles read access to the tenant-scoped planning data:
//! - Audit trail listing, filtering and export
//! - Dashboard aggregates (users, departments, fiscal years, plans)
//! - Caller to tenant resolution

pub mod audit_repository;
pub mod stats_repository;
pub mod tenant_repository;

pub use audit_repository::AuditRepository;
pub use stats_repository::StatsRepository;
pub use tenant_repository::TenantRepository;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::config::DatabaseConfig;

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool and apply pending migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .with_context(|| format!("Failed to connect to database: {}", config.url))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// Check that the database answers a trivial query
pub async fn check_health(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("Database health check failed")?;
    Ok(())
}

/// Format a timestamp the way it is stored: UTC, millisecond precision, `Z` suffix.
///
/// Every stored timestamp uses this exact shape so that text comparison in SQL
/// matches chronological order.
pub fn format_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp, accepting RFC 3339 and SQLite's `CURRENT_TIMESTAMP` shape
pub fn parse_db_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
    }
    None
}
