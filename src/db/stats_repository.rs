//! Tenant-scoped aggregate queries backing the dashboard

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::format_db_timestamp;
use crate::models::{PlanStats, UserStats};

/// Each method issues exactly one aggregate query and holds no state between
/// calls, so callers may run them concurrently.
pub struct StatsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StatsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Total and active user counts
    pub async fn user_counts(&self, tenant_id: Uuid) -> Result<UserStats> {
        let (total, active): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0)
            FROM users
            WHERE tenant_id = ?
            "#,
        )
        .bind(tenant_id.to_string())
        .fetch_one(self.pool)
        .await
        .context("Failed to count users")?;

        Ok(UserStats::from_counts(to_count(total), to_count(active)))
    }

    pub async fn department_count(&self, tenant_id: Uuid) -> Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM departments WHERE tenant_id = ?")
            .bind(tenant_id.to_string())
            .fetch_one(self.pool)
            .await
            .context("Failed to count departments")?;

        Ok(to_count(total))
    }

    /// Label of the most recently started fiscal year flagged active
    pub async fn active_fiscal_year(&self, tenant_id: Uuid) -> Result<Option<String>> {
        sqlx::query_scalar(
            r#"
            SELECT label FROM fiscal_years
            WHERE tenant_id = ? AND is_active = 1
            ORDER BY start_date DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch active fiscal year")
    }

    /// Strategic plan counts grouped by status
    pub async fn plan_counts(&self, tenant_id: Uuid) -> Result<PlanStats> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM strategic_plans WHERE tenant_id = ? GROUP BY status",
        )
        .bind(tenant_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to count strategic plans")?;

        Ok(PlanStats::from_status_counts(
            rows.into_iter()
                .map(|(status, count)| (status, to_count(count))),
        ))
    }

    /// Audit entries created at or after `since`
    pub async fn audit_count_since(&self, tenant_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_logs WHERE tenant_id = ? AND created_at >= ?",
        )
        .bind(tenant_id.to_string())
        .bind(format_db_timestamp(&since))
        .fetch_one(self.pool)
        .await
        .context("Failed to count recent audit activity")?;

        Ok(to_count(total))
    }
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}
