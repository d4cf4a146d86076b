//! HTTP boundary for the pricing-run workflow.
//!
//! Every route resolves the caller's tenant from the `x-tenant-id` header
//! before touching any service; workflow errors map to deterministic status
//! codes and flat, serializable detail payloads. Response bodies never carry
//! another tenant's identifiers or raw storage errors.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use pricerun_core::diff::VersionDiff;
use pricerun_core::domain::request::RequestLineItem;
use pricerun_core::domain::run::{
    ApprovalHistoryEntry, LineItemId, Outcome, PricingRun, RequestId, RunId, VersionSnapshot,
};
use pricerun_core::errors::{ErrorDetail, WorkflowError};
use pricerun_core::tenant::{TenantId, TenantResolver};
use pricerun_core::workflow::{
    ApprovalService, LineItemEdit, LockService, NewVersionOptions, OutcomeUpdate, RequestStore,
    VersionService,
};

const TENANT_HEADER: &str = "x-tenant-id";

#[derive(Clone)]
pub struct AppState {
    pub versions: Arc<dyn VersionService>,
    pub locks: Arc<dyn LockService>,
    pub approvals: Arc<dyn ApprovalService>,
    pub requests: Arc<dyn RequestStore>,
    pub tenants: Arc<dyn TenantResolver>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/pricing-runs/request/{request_id}", post(create_version))
        .route("/api/v1/pricing-runs/request/{request_id}/versions", get(list_versions))
        .route(
            "/api/v1/pricing-runs/request/{request_id}/version-snapshots",
            get(list_snapshots),
        )
        .route(
            "/api/v1/pricing-runs/request/{request_id}/compare-versions",
            get(compare_versions),
        )
        .route("/api/v1/pricing-runs/{run_id}/lock", post(lock_run))
        .route("/api/v1/pricing-runs/{run_id}/submit", post(submit_run))
        .route("/api/v1/pricing-runs/{run_id}/approve", post(approve_run))
        .route("/api/v1/pricing-runs/{run_id}/reject", post(reject_run))
        .route("/api/v1/pricing-runs/{run_id}/outcome", patch(update_outcome))
        .route("/api/v1/pricing-runs/{run_id}/revisions", post(create_revision))
        .route("/api/v1/pricing-runs/{run_id}/history", get(run_history))
        .route("/api/v1/requests/{request_id}/items/{item_id}", patch(edit_line_item))
        .with_state(state)
}

/// Workflow error carried to the HTTP layer. Status codes follow the stable
/// error codes, not the message text.
#[derive(Debug)]
pub struct ApiError(WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(error: WorkflowError) -> Self {
        Self(error)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.code() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION" => StatusCode::BAD_REQUEST,
            "CONFLICT" | "INVALID_STATE" => StatusCode::CONFLICT,
            "LOCKED" => StatusCode::LOCKED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.0.detail() })).into_response()
    }
}

async fn resolve_tenant(state: &AppState, headers: &HeaderMap) -> Result<TenantId, ApiError> {
    let raw = headers
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::from(WorkflowError::validation("missing x-tenant-id header")))?;
    Ok(state.tenants.resolve(raw).await?)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateVersionBody {
    superseded_reason: Option<String>,
    has_reprice_permission: bool,
    created_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LockBody {
    locked_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubmitBody {
    submitted_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApproveBody {
    approver: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RejectBody {
    approver: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutcomeBody {
    outcome: Option<String>,
    #[serde(rename = "outcomeDate")]
    outcome_date: Option<DateTime<Utc>>,
    #[serde(rename = "outcomeReason")]
    outcome_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RevisionBody {
    reason: Option<String>,
    created_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LineItemBody {
    catalog_ref: Option<String>,
    description: Option<String>,
    quantity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompareQuery {
    version1: Option<String>,
    version2: Option<String>,
}

#[derive(Debug, Serialize)]
struct VersionListResponse {
    count: usize,
    versions: Vec<PricingRun>,
}

#[derive(Serialize)]
struct SnapshotListResponse {
    count: usize,
    snapshots: Vec<VersionSnapshot>,
}

#[derive(Serialize)]
struct HistoryResponse {
    count: usize,
    entries: Vec<ApprovalHistoryEntry>,
}

async fn create_version(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CreateVersionBody>,
) -> Result<(StatusCode, Json<VersionSnapshot>), ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;
    let request_id = RequestId(request_id);

    let snapshot = state
        .versions
        .create_version(
            &request_id,
            &tenant,
            NewVersionOptions {
                superseded_reason: body.superseded_reason,
                has_reprice: body.has_reprice_permission,
                created_by: body.created_by,
            },
        )
        .await?;

    info!(
        event_name = "pricing_run.version_created",
        tenant_id = %tenant,
        request_id = %snapshot.run.request_id.0,
        run_id = %snapshot.run.id.0,
        version_number = snapshot.run.version_number,
        "pricing run version created"
    );
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn list_versions(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<VersionListResponse>, ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;
    let versions = state.versions.list_versions(&RequestId(request_id), &tenant).await?;
    Ok(Json(VersionListResponse { count: versions.len(), versions }))
}

async fn list_snapshots(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SnapshotListResponse>, ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;
    let snapshots = state.versions.list_snapshots(&RequestId(request_id), &tenant).await?;
    Ok(Json(SnapshotListResponse { count: snapshots.len(), snapshots }))
}

async fn compare_versions(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Query(query): Query<CompareQuery>,
    headers: HeaderMap,
) -> Result<Json<VersionDiff>, ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;

    let from = parse_version_param("version1", query.version1.as_deref())?
        .ok_or_else(|| ApiError::from(WorkflowError::validation("version1 is required")))?;
    let to = parse_version_param("version2", query.version2.as_deref())?;

    let diff = state.versions.compare_versions(&RequestId(request_id), from, to, &tenant).await?;
    Ok(Json(diff))
}

fn parse_version_param(name: &str, raw: Option<&str>) -> Result<Option<i64>, ApiError> {
    match raw {
        None => Ok(None),
        Some(value) => value.trim().parse::<i64>().map(Some).map_err(|_| {
            ApiError::from(WorkflowError::validation(format!("{name} must be an integer")))
        }),
    }
}

async fn lock_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<LockBody>,
) -> Result<Json<PricingRun>, ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;
    let run = state.locks.lock(&RunId(run_id), &tenant, body.locked_by).await?;

    info!(
        event_name = "pricing_run.locked",
        tenant_id = %tenant,
        run_id = %run.id.0,
        "pricing run locked for review"
    );
    Ok(Json(run))
}

async fn submit_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SubmitBody>,
) -> Result<Json<PricingRun>, ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;
    let actor = body.submitted_by.unwrap_or_else(|| "system".to_string());
    let run = state.approvals.submit(&RunId(run_id), &tenant, &actor).await?;

    info!(
        event_name = "pricing_run.submitted",
        tenant_id = %tenant,
        run_id = %run.id.0,
        "pricing run submitted for approval"
    );
    Ok(Json(run))
}

async fn approve_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ApproveBody>,
) -> Result<Json<PricingRun>, ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;
    let approver = required_actor("approver", body.approver)?;
    let run = state.approvals.approve(&RunId(run_id), &tenant, &approver, body.notes).await?;

    info!(
        event_name = "pricing_run.approved",
        tenant_id = %tenant,
        run_id = %run.id.0,
        approver = %approver,
        "pricing run approved"
    );
    Ok(Json(run))
}

async fn reject_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RejectBody>,
) -> Result<Json<PricingRun>, ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;
    let approver = required_actor("approver", body.approver)?;
    let reason = body.reason.unwrap_or_default();
    let run = state.approvals.reject(&RunId(run_id), &tenant, &approver, &reason).await?;

    info!(
        event_name = "pricing_run.rejected",
        tenant_id = %tenant,
        run_id = %run.id.0,
        approver = %approver,
        "pricing run rejected"
    );
    Ok(Json(run))
}

fn required_actor(field: &str, value: Option<String>) -> Result<String, ApiError> {
    value
        .map(|actor| actor.trim().to_string())
        .filter(|actor| !actor.is_empty())
        .ok_or_else(|| ApiError::from(WorkflowError::validation(format!("{field} is required"))))
}

async fn update_outcome(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<OutcomeBody>,
) -> Result<Json<PricingRun>, ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;
    let raw = body
        .outcome
        .ok_or_else(|| ApiError::from(WorkflowError::validation("outcome is required")))?;
    let outcome = Outcome::parse(&raw)?;

    let run = state
        .approvals
        .set_outcome(
            &RunId(run_id),
            &tenant,
            OutcomeUpdate {
                outcome,
                outcome_date: body.outcome_date,
                reason: body.outcome_reason,
            },
        )
        .await?;

    info!(
        event_name = "pricing_run.outcome_recorded",
        tenant_id = %tenant,
        run_id = %run.id.0,
        outcome = outcome.as_str(),
        "pricing run outcome recorded"
    );
    Ok(Json(run))
}

async fn create_revision(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RevisionBody>,
) -> Result<(StatusCode, Json<VersionSnapshot>), ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;
    let reason = body.reason.unwrap_or_default();
    let snapshot = state
        .versions
        .create_revision(&RunId(run_id), &tenant, &reason, body.created_by)
        .await?;

    info!(
        event_name = "pricing_run.revision_created",
        tenant_id = %tenant,
        request_id = %snapshot.run.request_id.0,
        run_id = %snapshot.run.id.0,
        version_number = snapshot.run.version_number,
        "pricing run revision created"
    );
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn run_history(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;
    let entries = state.approvals.history(&RunId(run_id), &tenant).await?;
    Ok(Json(HistoryResponse { count: entries.len(), entries }))
}

async fn edit_line_item(
    State(state): State<AppState>,
    Path((request_id, item_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<LineItemBody>,
) -> Result<Json<RequestLineItem>, ApiError> {
    let tenant = resolve_tenant(&state, &headers).await?;
    let item = state
        .requests
        .update_line_item(
            &RequestId(request_id),
            &LineItemId(item_id),
            &tenant,
            LineItemEdit {
                catalog_ref: body.catalog_ref,
                description: body.description,
                quantity: body.quantity,
            },
        )
        .await?;
    Ok(Json(item))
}
