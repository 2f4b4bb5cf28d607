//! Tenant (municipality) lookups

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct TenantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TenantRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Tenant of the given user, provided the municipality record exists
    pub async fn tenant_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>> {
        let tenant: Option<String> = sqlx::query_scalar(
            r#"
            SELECT m.id
            FROM users u
            INNER JOIN municipalities m ON m.id = u.tenant_id
            WHERE u.id = ?
            "#,
        )
        .bind(user_id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to resolve tenant for user")?;

        Ok(tenant.and_then(|t| Uuid::parse_str(&t).ok()))
    }
}
