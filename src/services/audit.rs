//! Audit & statistics service
//!
//! Answers three questions for an authenticated caller, always scoped to the
//! caller's tenant:
//! - a filtered, sorted, paginated page of audit entries
//! - the dashboard snapshot (users, departments, fiscal year, plans, activity)
//! - a CSV export of every entry matching a filter
//!
//! Every operation re-resolves the tenant and re-queries the store; nothing is
//! cached between requests. Each operation is bounded by the configured query
//! timeout and either fully succeeds or fully fails.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::AuditConfig;
use crate::db::{AuditRepository, DbPool, StatsRepository};
use crate::models::{
    ActivityStats, AuditFilterOptions, AuditLogFilter, AuditLogPage, Caller, DashboardStats,
    DepartmentStats, FiscalYearStats,
};
use crate::services::export::audit_logs_to_csv;
use crate::services::tenant::TenantResolver;

/// Window counted as "recent activity" on the dashboard
const RECENT_ACTIVITY_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum AuditServiceError {
    /// The caller has no resolvable tenant
    #[error("caller has no resolvable tenant")]
    Unauthorized,

    #[error("invalid audit log filter: {0}")]
    InvalidFilter(#[from] validator::ValidationErrors),

    #[error("export matches {matched} rows, above the limit of {limit}")]
    ExportTooLarge { matched: u64, limit: u64 },

    #[error("data store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("data store query failed: {0:#}")]
    DataStore(#[from] anyhow::Error),
}

pub struct AuditService {
    pool: DbPool,
    tenants: Arc<dyn TenantResolver>,
    query_timeout: Option<Duration>,
    export_max_rows: Option<u64>,
}

impl AuditService {
    /// Service with no query timeout and no export ceiling
    pub fn new(pool: DbPool, tenants: Arc<dyn TenantResolver>) -> Self {
        Self {
            pool,
            tenants,
            query_timeout: None,
            export_max_rows: None,
        }
    }

    pub fn from_config(
        pool: DbPool,
        tenants: Arc<dyn TenantResolver>,
        config: &AuditConfig,
    ) -> Self {
        Self::new(pool, tenants)
            .with_query_timeout(config.query_timeout())
            .with_export_max_rows(config.export_max_rows)
    }

    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_export_max_rows(mut self, max_rows: Option<u64>) -> Self {
        self.export_max_rows = max_rows;
        self
    }

    /// Filtered, sorted page of the caller's tenant's audit trail.
    ///
    /// An unresolvable tenant yields an empty page rather than an error, and a
    /// page past the end yields no entries with the true totals.
    pub async fn list_audit_logs(
        &self,
        caller: &Caller,
        filter: &AuditLogFilter,
    ) -> Result<AuditLogPage, AuditServiceError> {
        filter.validate()?;
        let filter = filter.clone().normalized();
        self.bounded(self.list_in_tenant(caller, &filter)).await
    }

    /// Dashboard snapshot for the caller's tenant. Fails with
    /// [`AuditServiceError::Unauthorized`] when the tenant cannot be resolved.
    pub async fn get_dashboard_stats(
        &self,
        caller: &Caller,
    ) -> Result<DashboardStats, AuditServiceError> {
        self.bounded(self.stats_for_tenant(caller)).await
    }

    /// CSV of every entry matching the filter; pagination fields are ignored.
    pub async fn export_audit_logs(
        &self,
        caller: &Caller,
        filter: &AuditLogFilter,
    ) -> Result<String, AuditServiceError> {
        let filter = filter.clone().normalized();
        self.bounded(self.export_in_tenant(caller, &filter)).await
    }

    /// Distinct actions, entity types and actors for the filter drop-downs
    pub async fn filter_options(
        &self,
        caller: &Caller,
    ) -> Result<AuditFilterOptions, AuditServiceError> {
        self.bounded(self.options_for_tenant(caller)).await
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, AuditServiceError>
    where
        F: Future<Output = Result<T, AuditServiceError>>,
    {
        match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| AuditServiceError::Timeout(limit))?,
            None => operation.await,
        }
    }

    async fn resolve_tenant(&self, caller: &Caller) -> Result<Option<Uuid>, AuditServiceError> {
        let tenant = self.tenants.resolve_caller_tenant(caller).await?;
        if tenant.is_none() {
            warn!(user_id = %caller.user_id, "No tenant resolved for caller");
        }
        Ok(tenant)
    }

    async fn list_in_tenant(
        &self,
        caller: &Caller,
        filter: &AuditLogFilter,
    ) -> Result<AuditLogPage, AuditServiceError> {
        let Some(tenant_id) = self.resolve_tenant(caller).await? else {
            return Ok(AuditLogPage::empty(filter.page, filter.limit));
        };

        let repo = AuditRepository::new(&self.pool);
        let total = repo.count(tenant_id, filter).await?;
        let logs = if filter.offset() < total {
            repo.list_page(tenant_id, filter).await?
        } else {
            Vec::new()
        };

        debug!(
            tenant_id = %tenant_id,
            total,
            returned = logs.len(),
            page = filter.page,
            "Listed audit logs"
        );

        Ok(AuditLogPage::new(logs, total, filter.page, filter.limit))
    }

    async fn stats_for_tenant(&self, caller: &Caller) -> Result<DashboardStats, AuditServiceError> {
        let tenant_id = self
            .resolve_tenant(caller)
            .await?
            .ok_or(AuditServiceError::Unauthorized)?;

        let stats = StatsRepository::new(&self.pool);
        let since = Utc::now() - chrono::Duration::hours(RECENT_ACTIVITY_HOURS);

        let (users, departments, fiscal_year, strategic_plans, recent) = tokio::try_join!(
            stats.user_counts(tenant_id),
            stats.department_count(tenant_id),
            stats.active_fiscal_year(tenant_id),
            stats.plan_counts(tenant_id),
            stats.audit_count_since(tenant_id, since),
        )?;

        debug!(tenant_id = %tenant_id, "Computed dashboard statistics");

        Ok(DashboardStats {
            users,
            departments: DepartmentStats { total: departments },
            fiscal_year: FiscalYearStats {
                current: fiscal_year,
            },
            strategic_plans,
            activity: ActivityStats {
                last_24_hours: recent,
            },
        })
    }

    async fn export_in_tenant(
        &self,
        caller: &Caller,
        filter: &AuditLogFilter,
    ) -> Result<String, AuditServiceError> {
        let Some(tenant_id) = self.resolve_tenant(caller).await? else {
            return Ok(audit_logs_to_csv(&[]));
        };

        let repo = AuditRepository::new(&self.pool);
        if let Some(limit) = self.export_max_rows {
            let matched = repo.count(tenant_id, filter).await?;
            if matched > limit {
                return Err(AuditServiceError::ExportTooLarge { matched, limit });
            }
        }

        let entries = repo.list_all(tenant_id, filter).await?;
        debug!(tenant_id = %tenant_id, rows = entries.len(), "Exported audit logs");

        Ok(audit_logs_to_csv(&entries))
    }

    async fn options_for_tenant(
        &self,
        caller: &Caller,
    ) -> Result<AuditFilterOptions, AuditServiceError> {
        match self.resolve_tenant(caller).await? {
            Some(tenant_id) => Ok(AuditRepository::new(&self.pool)
                .filter_options(tenant_id)
                .await?),
            None => Ok(AuditFilterOptions::default()),
        }
    }
}
