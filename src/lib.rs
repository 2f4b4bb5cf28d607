//! CityPlan Audit Library
//!
//! Tenant-scoped audit trail listing, CSV export and dashboard statistics for
//! the municipal strategic-planning application.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{auth_middleware, AuthUser, Claims};
use services::{AuditService, DbTenantResolver};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Audit & statistics service
    pub audit: Arc<AuditService>,
}

impl AppState {
    /// State with the database-backed tenant resolver
    pub fn new(config: AppConfig, db: DbPool) -> Self {
        let tenants = Arc::new(DbTenantResolver::new(db.clone()));
        let audit = Arc::new(AuditService::from_config(db.clone(), tenants, &config.audit));
        Self { config, db, audit }
    }
}
