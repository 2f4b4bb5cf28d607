//! Caller to tenant resolution

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::db::{DbPool, TenantRepository};
use crate::models::Caller;

/// Maps an authenticated caller to the municipality whose data they may see.
///
/// `Ok(None)` means the caller has no known tenant. Errors are reserved for
/// failures of the underlying lookup.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    async fn resolve_caller_tenant(&self, caller: &Caller) -> Result<Option<Uuid>>;
}

/// Resolves tenants from the `users` and `municipalities` tables
#[derive(Clone)]
pub struct DbTenantResolver {
    pool: DbPool,
}

impl DbTenantResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantResolver for DbTenantResolver {
    async fn resolve_caller_tenant(&self, caller: &Caller) -> Result<Option<Uuid>> {
        TenantRepository::new(&self.pool)
            .tenant_for_user(caller.user_id)
            .await
    }
}
