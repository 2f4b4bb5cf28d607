//! Business logic services

pub mod audit;
pub mod export;
pub mod tenant;

pub use audit::{AuditService, AuditServiceError};
pub use export::{audit_logs_to_csv, escape_csv_field, AUDIT_CSV_COLUMNS};
pub use tenant::{DbTenantResolver, TenantResolver};
