use async_trait::async_trait;
use chrono::Utc;

use pricerun_core::domain::run::{PricingRun, RequestId, RunId};
use pricerun_core::errors::WorkflowError;
use pricerun_core::tenant::TenantId;
use pricerun_core::workflow::LockService;

use super::rows;
use crate::DbPool;

/// Persisted lock flag on a pricing run.
///
/// Locking needs no exclusive serialization beyond ordinary row-update
/// semantics: the guarded UPDATE only fires while `locked_at` is NULL, and a
/// concurrent loser simply reads back the winner's lock metadata.
pub struct SqlLockStore {
    pool: DbPool,
}

impl SqlLockStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockService for SqlLockStore {
    async fn lock(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        locked_by: Option<String>,
    ) -> Result<PricingRun, WorkflowError> {
        let run = rows::fetch_run(&self.pool, run_id, tenant)
            .await?
            .ok_or(WorkflowError::NotFound { resource: "pricing run" })?;
        if run.is_locked() {
            return Ok(run);
        }

        sqlx::query(
            "UPDATE pricing_run SET locked_at = ?, locked_by = ?
             WHERE id = ? AND tenant_id = ? AND locked_at IS NULL",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&locked_by)
        .bind(&run_id.0)
        .bind(tenant.as_str())
        .execute(&self.pool)
        .await
        .map_err(rows::db_err)?;

        rows::fetch_run(&self.pool, run_id, tenant)
            .await?
            .ok_or_else(|| WorkflowError::internal("locked pricing run disappeared"))
    }

    async fn assert_request_unlocked(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
    ) -> Result<(), WorkflowError> {
        let current = rows::fetch_current_run(&self.pool, request_id, tenant).await?;
        match current {
            Some(run) => match run.locked_at {
                Some(locked_at) => {
                    Err(WorkflowError::Locked { locked_at, locked_by: run.locked_by })
                }
                None => Ok(()),
            },
            None => Ok(()),
        }
    }
}
