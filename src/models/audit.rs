//! Audit log models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Free-form key/value payload attached to an audit entry
pub type AuditDetails = serde_json::Map<String, serde_json::Value>;

/// Default page size for audit log listings
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page size a listing may request
pub const MAX_PAGE_SIZE: u32 = 1000;

/// An immutable record of one state-changing action, enriched with the
/// acting user's name and email when the action was not system-initiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Option<AuditDetails>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Label for the acting user: display name, then email, then `System`
    pub fn actor_label(&self) -> &str {
        self.user_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.user_email.as_deref())
            .unwrap_or("System")
    }
}

/// An entry about to be appended to the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditLogEntry {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub details: Option<AuditDetails>,
}

/// Column an audit listing can be ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSortField {
    #[default]
    CreatedAt,
    Action,
    EntityType,
    EntityId,
    UserName,
}

impl AuditSortField {
    /// SQL column expression in the joined audit query
    pub fn column(&self) -> &'static str {
        match self {
            AuditSortField::CreatedAt => "a.created_at",
            AuditSortField::Action => "a.action",
            AuditSortField::EntityType => "a.entity_type",
            AuditSortField::EntityId => "a.entity_id",
            AuditSortField::UserName => "u.full_name",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Query descriptor for audit listings and exports.
///
/// Bounds are inclusive. A window whose start lies after its end is valid
/// and simply matches nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AuditLogFilter {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub sort_by: AuditSortField,
    #[serde(default)]
    pub sort_order: SortDirection,
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: u32,
}

/// Parse an optional query value, reading an empty one as absent
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map(Some).map_err(de::Error::custom)
        }
        _ => Ok(None),
    }
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for AuditLogFilter {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            user_id: None,
            action: None,
            entity_type: None,
            sort_by: AuditSortField::default(),
            sort_order: SortDirection::default(),
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl AuditLogFilter {
    /// Drop blank string filters, which forms submit for "any"
    pub fn normalized(mut self) -> Self {
        self.action = self.action.filter(|a| !a.trim().is_empty());
        self.entity_type = self.entity_type.filter(|e| !e.trim().is_empty());
        self
    }

    /// Number of rows skipped before the requested page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of an audit listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogPage {
    pub logs: Vec<AuditLogEntry>,
    /// Entries matching the filter, ignoring pagination
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl AuditLogPage {
    pub fn new(logs: Vec<AuditLogEntry>, total: u64, page: u32, limit: u32) -> Self {
        Self {
            logs,
            total,
            page,
            limit,
            total_pages: total_pages(total, limit),
        }
    }

    /// Page returned when the caller's tenant cannot be resolved
    pub fn empty(page: u32, limit: u32) -> Self {
        Self::new(Vec::new(), 0, page, limit)
    }
}

/// `ceil(total / limit)`; zero exactly when `total` is zero
pub fn total_pages(total: u64, limit: u32) -> u64 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(u64::from(limit))
}

/// A user that appears as an actor in the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditActor {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Distinct values present in a tenant's audit trail, for filter drop-downs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditFilterOptions {
    pub actions: Vec<String>,
    pub entity_types: Vec<String>,
    pub users: Vec<AuditActor>,
}
