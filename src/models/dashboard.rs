//! Dashboard statistics models

use serde::{Deserialize, Serialize};

/// Tenant-wide snapshot shown on the city manager dashboard.
///
/// Computed fresh for every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub users: UserStats,
    pub departments: DepartmentStats,
    pub fiscal_year: FiscalYearStats,
    pub strategic_plans: PlanStats,
    pub activity: ActivityStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
}

impl UserStats {
    pub fn from_counts(total: u64, active: u64) -> Self {
        Self {
            total,
            active,
            inactive: total.saturating_sub(active),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentStats {
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYearStats {
    /// Label of the most recent active fiscal year, if any is flagged active
    pub current: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStats {
    pub total: u64,
    pub draft: u64,
    pub submitted: u64,
    pub approved: u64,
}

impl PlanStats {
    /// Fold `(status, count)` rows into the tracked buckets.
    ///
    /// Statuses outside draft/submitted/approved only count toward the total.
    pub fn from_status_counts<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        rows.into_iter().fold(Self::default(), |mut stats, (status, count)| {
            stats.total += count;
            match status.as_ref() {
                "draft" => stats.draft += count,
                "submitted" => stats.submitted += count,
                "approved" => stats.approved += count,
                _ => {}
            }
            stats
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStats {
    /// Audit entries created within the last 24 hours
    pub last_24_hours: u64,
}
