use async_trait::async_trait;

use pricerun_core::domain::run::{
    ApprovalAction, ApprovalHistoryEntry, ApprovalStatus, PricingRun, RunId,
};
use pricerun_core::errors::WorkflowError;
use pricerun_core::tenant::TenantId;
use pricerun_core::workflow::{ApprovalService, OutcomeUpdate};

use super::rows;
use crate::DbPool;

/// SQL-backed approval workflow.
///
/// Transitions re-check the source state inside the same transaction that
/// writes the new state and the history row: the status change is a guarded
/// UPDATE (`... AND approval_status = ?`), so of two concurrent deciders the
/// loser observes a state mismatch and fails `INVALID_STATE` instead of
/// double-writing the audit trail.
pub struct SqlApprovalStore {
    pool: DbPool,
}

impl SqlApprovalStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn transition(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        action: &'static str,
        next: ApprovalStatus,
        history_action: ApprovalAction,
        actor: &str,
        notes: Option<String>,
    ) -> Result<PricingRun, WorkflowError> {
        let mut tx = self.pool.begin().await.map_err(rows::db_err)?;

        let run = rows::fetch_run(&mut *tx, run_id, tenant)
            .await?
            .ok_or(WorkflowError::NotFound { resource: "pricing run" })?;
        if !run.approval_status.can_transition_to(next) {
            return Err(WorkflowError::InvalidState { action, current: run.approval_status });
        }

        let updated = sqlx::query(
            "UPDATE pricing_run SET approval_status = ?
             WHERE id = ? AND tenant_id = ? AND approval_status = ?",
        )
        .bind(next.as_str())
        .bind(&run_id.0)
        .bind(tenant.as_str())
        .bind(run.approval_status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(rows::db_err)?;

        if updated.rows_affected() == 0 {
            let current = rows::fetch_run(&mut *tx, run_id, tenant)
                .await?
                .ok_or(WorkflowError::NotFound { resource: "pricing run" })?;
            return Err(WorkflowError::InvalidState { action, current: current.approval_status });
        }

        let entry = ApprovalHistoryEntry::record(&run, history_action, actor, notes);
        append_history(&mut tx, &entry).await?;

        tx.commit().await.map_err(rows::db_err)?;

        rows::fetch_run(&self.pool, run_id, tenant)
            .await?
            .ok_or_else(|| WorkflowError::internal("transitioned pricing run disappeared"))
    }
}

#[async_trait]
impl ApprovalService for SqlApprovalStore {
    async fn submit(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        actor: &str,
    ) -> Result<PricingRun, WorkflowError> {
        self.transition(
            run_id,
            tenant,
            "submit",
            ApprovalStatus::PendingApproval,
            ApprovalAction::Submitted,
            actor,
            None,
        )
        .await
    }

    async fn approve(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        approver: &str,
        notes: Option<String>,
    ) -> Result<PricingRun, WorkflowError> {
        self.transition(
            run_id,
            tenant,
            "approve",
            ApprovalStatus::Approved,
            ApprovalAction::Approved,
            approver,
            notes,
        )
        .await
    }

    async fn reject(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        approver: &str,
        reason: &str,
    ) -> Result<PricingRun, WorkflowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::validation("rejection reason must not be empty"));
        }
        self.transition(
            run_id,
            tenant,
            "reject",
            ApprovalStatus::Rejected,
            ApprovalAction::Rejected,
            approver,
            Some(reason.to_string()),
        )
        .await
    }

    async fn set_outcome(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        update: OutcomeUpdate,
    ) -> Result<PricingRun, WorkflowError> {
        let run = rows::fetch_run(&self.pool, run_id, tenant)
            .await?
            .ok_or(WorkflowError::NotFound { resource: "pricing run" })?;

        sqlx::query(
            "UPDATE pricing_run SET outcome = ?, outcome_date = ?, outcome_reason = ?
             WHERE id = ? AND tenant_id = ?",
        )
        .bind(update.outcome.as_str())
        .bind(update.outcome_date.map(|date| date.to_rfc3339()))
        .bind(&update.reason)
        .bind(&run.id.0)
        .bind(tenant.as_str())
        .execute(&self.pool)
        .await
        .map_err(rows::db_err)?;

        rows::fetch_run(&self.pool, run_id, tenant)
            .await?
            .ok_or_else(|| WorkflowError::internal("updated pricing run disappeared"))
    }

    async fn history(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
    ) -> Result<Vec<ApprovalHistoryEntry>, WorkflowError> {
        rows::fetch_run(&self.pool, run_id, tenant)
            .await?
            .ok_or(WorkflowError::NotFound { resource: "pricing run" })?;

        let fetched = sqlx::query(
            "SELECT id, run_id, tenant_id, action, actor, notes, created_at
             FROM approval_history
             WHERE run_id = ? AND tenant_id = ?
             ORDER BY created_at, id",
        )
        .bind(&run_id.0)
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(rows::db_err)?;
        fetched.iter().map(rows::decode_history).collect()
    }
}

async fn append_history(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    entry: &ApprovalHistoryEntry,
) -> Result<(), WorkflowError> {
    sqlx::query(
        "INSERT INTO approval_history (id, run_id, tenant_id, action, actor, notes, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.run_id.0)
    .bind(entry.tenant_id.as_str())
    .bind(entry.action.as_str())
    .bind(&entry.actor)
    .bind(&entry.notes)
    .bind(entry.created_at.to_rfc3339())
    .execute(&mut **tx)
    .await
    .map_err(rows::db_err)?;
    Ok(())
}
