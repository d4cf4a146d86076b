use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::diff::VersionDiff;
use crate::domain::request::{PriceRequest, RequestLineItem};
use crate::domain::run::{
    ApprovalHistoryEntry, LineItemId, Outcome, PricingRun, RequestId, RunId, VersionSnapshot,
};
use crate::errors::WorkflowError;
use crate::tenant::TenantId;

/// Inputs for creating the next pricing-run version of a request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewVersionOptions {
    /// Required (non-empty) when the current run is approved.
    pub superseded_reason: Option<String>,
    /// Explicit permission to replace an approved current run.
    pub has_reprice: bool,
    pub created_by: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutcomeUpdate {
    pub outcome: Outcome,
    pub outcome_date: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

/// Partial edit of a request line item. Absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineItemEdit {
    pub catalog_ref: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i64>,
}

/// Versioned pricing-run lifecycle for a request: creation under the
/// supersession gate, listing, snapshots, and structural diffs.
///
/// Implementations must keep, per request, at most one run current and the
/// version numbers gapless, with version creation serialized so concurrent
/// calls cannot both observe the same current run.
#[async_trait]
pub trait VersionService: Send + Sync {
    async fn create_version(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
        options: NewVersionOptions,
    ) -> Result<VersionSnapshot, WorkflowError>;

    async fn list_versions(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
    ) -> Result<Vec<PricingRun>, WorkflowError>;

    async fn get_snapshot(
        &self,
        request_id: &RequestId,
        version: i64,
        tenant: &TenantId,
    ) -> Result<VersionSnapshot, WorkflowError>;

    async fn list_snapshots(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
    ) -> Result<Vec<VersionSnapshot>, WorkflowError>;

    /// `to_version` defaults to the current version when absent.
    async fn compare_versions(
        &self,
        request_id: &RequestId,
        from_version: i64,
        to_version: Option<i64>,
        tenant: &TenantId,
    ) -> Result<VersionDiff, WorkflowError>;

    /// Operator-facing alias over [`VersionService::create_version`], keyed by
    /// an existing run instead of the request. Requires a non-empty `reason`
    /// and delegates with reprice permission granted, the reason doubling as
    /// the supersession reason.
    async fn create_revision(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        reason: &str,
        created_by: Option<String>,
    ) -> Result<VersionSnapshot, WorkflowError>;
}

/// Persisted freeze on a run ahead of approval review.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Idempotent: locking an already-locked run returns the existing lock
    /// metadata untouched.
    async fn lock(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        locked_by: Option<String>,
    ) -> Result<PricingRun, WorkflowError>;

    /// Fails `LOCKED` (with lock metadata) when the request's current run is
    /// locked. Line-item mutation paths call this before writing.
    async fn assert_request_unlocked(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
    ) -> Result<(), WorkflowError>;
}

/// The draft → pending_approval → {approved, rejected} workflow plus the
/// outcome side channel and the append-only decision history.
#[async_trait]
pub trait ApprovalService: Send + Sync {
    async fn submit(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        actor: &str,
    ) -> Result<PricingRun, WorkflowError>;

    async fn approve(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        approver: &str,
        notes: Option<String>,
    ) -> Result<PricingRun, WorkflowError>;

    async fn reject(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        approver: &str,
        reason: &str,
    ) -> Result<PricingRun, WorkflowError>;

    async fn set_outcome(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        update: OutcomeUpdate,
    ) -> Result<PricingRun, WorkflowError>;

    async fn history(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
    ) -> Result<Vec<ApprovalHistoryEntry>, WorkflowError>;
}

/// Read/guarded-write access to requests and their line items.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn find_request(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
    ) -> Result<PriceRequest, WorkflowError>;

    async fn list_line_items(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
    ) -> Result<Vec<RequestLineItem>, WorkflowError>;

    /// Refuses with `LOCKED` while the request's current run is locked.
    async fn update_line_item(
        &self,
        request_id: &RequestId,
        item_id: &LineItemId,
        tenant: &TenantId,
        edit: LineItemEdit,
    ) -> Result<RequestLineItem, WorkflowError>;
}
