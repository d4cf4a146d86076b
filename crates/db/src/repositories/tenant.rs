use async_trait::async_trait;

use pricerun_core::errors::WorkflowError;
use pricerun_core::tenant::{TenantId, TenantResolver};

use super::rows;
use crate::DbPool;

/// Resolves tenant references against the `tenant` table. An unknown tenant
/// answers `NOT_FOUND`, the same as any other absent resource.
pub struct SqlTenantResolver {
    pool: DbPool,
}

impl SqlTenantResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantResolver for SqlTenantResolver {
    async fn resolve(&self, raw: &str) -> Result<TenantId, WorkflowError> {
        let tenant = TenantId::parse(raw)?;
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tenant WHERE id = ?)")
            .bind(tenant.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(rows::db_err)?;
        if exists == 1 {
            Ok(tenant)
        } else {
            Err(WorkflowError::NotFound { resource: "tenant" })
        }
    }
}
