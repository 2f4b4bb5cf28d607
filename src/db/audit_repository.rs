//! Audit log repository

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{format_db_timestamp, parse_db_timestamp};
use crate::models::{
    AuditActor, AuditDetails, AuditFilterOptions, AuditLogEntry, AuditLogFilter, NewAuditLogEntry,
};

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: String,
    tenant_id: String,
    user_id: Option<String>,
    user_name: Option<String>,
    user_email: Option<String>,
    action: String,
    entity_type: String,
    entity_id: String,
    details: Option<String>,
    created_at: String,
}

/// Audit entries joined to their acting user. The join is tenant-bound so a
/// stray user id never pulls in another tenant's user.
const SELECT_AUDIT_WITH_USER: &str = r#"
    SELECT a.id, a.tenant_id, a.user_id, u.full_name AS user_name, u.email AS user_email,
           a.action, a.entity_type, a.entity_id, a.details, a.created_at
    FROM audit_logs a
    LEFT JOIN users u ON u.id = a.user_id AND u.tenant_id = a.tenant_id
"#;

pub struct AuditRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an entry stamped with the current time
    pub async fn insert(&self, entry: &NewAuditLogEntry) -> Result<AuditLogEntry> {
        self.insert_at(entry, Utc::now()).await
    }

    /// Append an entry with an explicit creation time
    pub async fn insert_at(
        &self,
        entry: &NewAuditLogEntry,
        created_at: DateTime<Utc>,
    ) -> Result<AuditLogEntry> {
        let id = Uuid::new_v4();
        let created_at_str = format_db_timestamp(&created_at);
        let details_str = entry
            .details
            .as_ref()
            .map(|d| serde_json::Value::Object(d.clone()).to_string());

        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, tenant_id, user_id, action, entity_type, entity_id, details, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(entry.tenant_id.to_string())
        .bind(entry.user_id.map(|u| u.to_string()))
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(details_str.as_deref())
        .bind(&created_at_str)
        .execute(self.pool)
        .await
        .context("Failed to insert audit log entry")?;

        Ok(AuditLogEntry {
            id,
            tenant_id: entry.tenant_id,
            user_id: entry.user_id,
            user_name: None,
            user_email: None,
            action: entry.action.clone(),
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_id.clone(),
            details: entry.details.clone(),
            created_at: parse_db_timestamp(&created_at_str).unwrap_or(created_at),
        })
    }

    /// Count entries matching the filter, ignoring pagination
    pub async fn count(&self, tenant_id: Uuid, filter: &AuditLogFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM audit_logs a");
        push_filters(&mut qb, tenant_id, filter);

        let total: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await
            .context("Failed to count audit logs")?;

        Ok(u64::try_from(total).unwrap_or_default())
    }

    /// One page of entries matching the filter, in the requested order
    pub async fn list_page(
        &self,
        tenant_id: Uuid,
        filter: &AuditLogFilter,
    ) -> Result<Vec<AuditLogEntry>> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_AUDIT_WITH_USER);
        push_filters(&mut qb, tenant_id, filter);
        push_order(&mut qb, filter);
        qb.push(" LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX));

        let rows = qb
            .build_query_as::<AuditRow>()
            .fetch_all(self.pool)
            .await
            .context("Failed to list audit logs")?;

        Ok(rows.into_iter().map(row_to_audit).collect())
    }

    /// Every entry matching the filter, in the requested order, unpaginated
    pub async fn list_all(
        &self,
        tenant_id: Uuid,
        filter: &AuditLogFilter,
    ) -> Result<Vec<AuditLogEntry>> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_AUDIT_WITH_USER);
        push_filters(&mut qb, tenant_id, filter);
        push_order(&mut qb, filter);

        let rows = qb
            .build_query_as::<AuditRow>()
            .fetch_all(self.pool)
            .await
            .context("Failed to export audit logs")?;

        Ok(rows.into_iter().map(row_to_audit).collect())
    }

    /// Distinct actions, entity types and actors present in a tenant's trail
    pub async fn filter_options(&self, tenant_id: Uuid) -> Result<AuditFilterOptions> {
        let tenant = tenant_id.to_string();

        let actions: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT action FROM audit_logs WHERE tenant_id = ? ORDER BY action",
        )
        .bind(&tenant)
        .fetch_all(self.pool)
        .await
        .context("Failed to list audit actions")?;

        let entity_types: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT entity_type FROM audit_logs WHERE tenant_id = ? ORDER BY entity_type",
        )
        .bind(&tenant)
        .fetch_all(self.pool)
        .await
        .context("Failed to list audit entity types")?;

        let user_rows: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT DISTINCT a.user_id, u.full_name, u.email
            FROM audit_logs a
            LEFT JOIN users u ON u.id = a.user_id AND u.tenant_id = a.tenant_id
            WHERE a.tenant_id = ? AND a.user_id IS NOT NULL
            ORDER BY u.full_name, u.email, a.user_id
            "#,
        )
        .bind(&tenant)
        .fetch_all(self.pool)
        .await
        .context("Failed to list audit actors")?;

        let users = user_rows
            .into_iter()
            .filter_map(|(id, name, email)| {
                Uuid::parse_str(&id)
                    .ok()
                    .map(|id| AuditActor { id, name, email })
            })
            .collect();

        Ok(AuditFilterOptions {
            actions,
            entity_types,
            users,
        })
    }
}

/// Tenant scope first, then the optional filters in a fixed order
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, tenant_id: Uuid, filter: &AuditLogFilter) {
    qb.push(" WHERE a.tenant_id = ").push_bind(tenant_id.to_string());

    if let Some(ref start) = filter.start_date {
        qb.push(" AND a.created_at >= ").push_bind(lower_bound(start));
    }
    if let Some(ref end) = filter.end_date {
        qb.push(" AND a.created_at <= ").push_bind(format_db_timestamp(end));
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND a.user_id = ").push_bind(user_id.to_string());
    }
    if let Some(ref action) = filter.action {
        qb.push(" AND a.action = ").push_bind(action.clone());
    }
    if let Some(ref entity_type) = filter.entity_type {
        qb.push(" AND a.entity_type = ").push_bind(entity_type.clone());
    }
}

/// Stored form of the earliest millisecond not before `start`.
///
/// Stored timestamps carry milliseconds only, so a sub-millisecond start is
/// rounded up; truncating it would admit the millisecond before the window.
fn lower_bound(start: &DateTime<Utc>) -> String {
    let sub_milli = i64::from(start.timestamp_subsec_nanos() % 1_000_000);
    if sub_milli == 0 {
        return format_db_timestamp(start);
    }
    format_db_timestamp(&(*start + Duration::nanoseconds(1_000_000 - sub_milli)))
}

fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, filter: &AuditLogFilter) {
    let direction = filter.sort_order.sql();
    qb.push(format!(
        " ORDER BY {} {}, a.id {}",
        filter.sort_by.column(),
        direction,
        direction
    ));
}

fn parse_details(raw: &str) -> Option<AuditDetails> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn row_to_audit(row: AuditRow) -> AuditLogEntry {
    let created_at = parse_db_timestamp(&row.created_at).unwrap_or_else(|| {
        tracing::warn!(id = %row.id, created_at = %row.created_at, "Unparseable audit timestamp");
        DateTime::<Utc>::default()
    });

    AuditLogEntry {
        id: Uuid::parse_str(&row.id).unwrap_or_else(|_| Uuid::nil()),
        tenant_id: Uuid::parse_str(&row.tenant_id).unwrap_or_else(|_| Uuid::nil()),
        user_id: row.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        user_name: row.user_name,
        user_email: row.user_email,
        action: row.action,
        entity_type: row.entity_type,
        entity_id: row.entity_id,
        details: row.details.as_deref().and_then(parse_details),
        created_at,
    }
}
