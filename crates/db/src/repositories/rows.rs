//! Row decoding shared by the SQL stores.
//!
//! Money columns are stored as text and parsed back into `Decimal`;
//! timestamps are RFC 3339 text. A row that fails to decode is a storage
//! fault, not a business-rule violation, so everything here reports
//! `INTERNAL`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use pricerun_core::domain::request::{PriceRequest, RequestLineItem};
use pricerun_core::domain::run::{
    ApprovalAction, ApprovalHistoryEntry, ApprovalStatus, LineItemId, Outcome, PricingMethod,
    PricingRun, PricingRunItem, RequestId, RunId,
};
use pricerun_core::errors::WorkflowError;
use pricerun_core::tenant::TenantId;

pub(crate) const RUN_COLUMNS: &str = "id, request_id, tenant_id, version_number, is_current, \
     approval_status, outcome, outcome_date, outcome_reason, locked_at, locked_by, \
     superseded_reason, total_price, created_by, created_at";

pub(crate) const RUN_ITEM_COLUMNS: &str = "id, run_id, tenant_id, line_item_id, catalog_ref, \
     description, quantity, base_cost, unit_price, markup_pct, logistics_cost, risk_cost, \
     pricing_method, line_total";

pub(crate) fn db_err(error: sqlx::Error) -> WorkflowError {
    WorkflowError::internal(format!("database error: {error}"))
}

fn decode_err(column: &str, detail: impl fmt::Display) -> WorkflowError {
    WorkflowError::internal(format!("failed to decode column `{column}`: {detail}"))
}

fn col<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, WorkflowError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get::<T, _>(column).map_err(|error| decode_err(column, error))
}

fn tenant_id(row: &SqliteRow) -> Result<TenantId, WorkflowError> {
    let raw: String = col(row, "tenant_id")?;
    TenantId::parse(&raw).map_err(|_| decode_err("tenant_id", "stored identifier is malformed"))
}

fn decimal(row: &SqliteRow, column: &str) -> Result<Decimal, WorkflowError> {
    let raw: String = col(row, column)?;
    Decimal::from_str(&raw).map_err(|error| decode_err(column, error))
}

fn timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, WorkflowError> {
    let raw: String = col(row, column)?;
    parse_timestamp(column, &raw)
}

fn opt_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>, WorkflowError> {
    col::<Option<String>>(row, column)?
        .map(|raw| parse_timestamp(column, &raw))
        .transpose()
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, WorkflowError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| decode_err(column, error))
}

pub(crate) fn decode_run(row: &SqliteRow) -> Result<PricingRun, WorkflowError> {
    let approval_status_raw: String = col(row, "approval_status")?;
    let approval_status = ApprovalStatus::parse(&approval_status_raw).ok_or_else(|| {
        decode_err("approval_status", format!("unknown status `{approval_status_raw}`"))
    })?;

    let outcome = match col::<Option<String>>(row, "outcome")? {
        Some(raw) => Some(
            Outcome::parse(&raw)
                .map_err(|_| decode_err("outcome", format!("unknown outcome `{raw}`")))?,
        ),
        None => None,
    };

    Ok(PricingRun {
        id: RunId(col(row, "id")?),
        request_id: RequestId(col(row, "request_id")?),
        tenant_id: tenant_id(row)?,
        version_number: col(row, "version_number")?,
        is_current: col::<i64>(row, "is_current")? != 0,
        approval_status,
        outcome,
        outcome_date: opt_timestamp(row, "outcome_date")?,
        outcome_reason: col(row, "outcome_reason")?,
        locked_at: opt_timestamp(row, "locked_at")?,
        locked_by: col(row, "locked_by")?,
        superseded_reason: col(row, "superseded_reason")?,
        total_price: decimal(row, "total_price")?,
        created_by: col(row, "created_by")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn decode_run_item(row: &SqliteRow) -> Result<PricingRunItem, WorkflowError> {
    let method_raw: String = col(row, "pricing_method")?;
    let pricing_method = PricingMethod::parse(&method_raw).ok_or_else(|| {
        decode_err("pricing_method", format!("unknown pricing method `{method_raw}`"))
    })?;

    Ok(PricingRunItem {
        id: col(row, "id")?,
        run_id: RunId(col(row, "run_id")?),
        tenant_id: tenant_id(row)?,
        line_item_id: LineItemId(col(row, "line_item_id")?),
        catalog_ref: col(row, "catalog_ref")?,
        description: col(row, "description")?,
        quantity: col(row, "quantity")?,
        base_cost: decimal(row, "base_cost")?,
        unit_price: decimal(row, "unit_price")?,
        markup_pct: decimal(row, "markup_pct")?,
        logistics_cost: decimal(row, "logistics_cost")?,
        risk_cost: decimal(row, "risk_cost")?,
        pricing_method,
        line_total: decimal(row, "line_total")?,
    })
}

pub(crate) fn decode_history(row: &SqliteRow) -> Result<ApprovalHistoryEntry, WorkflowError> {
    let action_raw: String = col(row, "action")?;
    let action = ApprovalAction::parse(&action_raw)
        .ok_or_else(|| decode_err("action", format!("unknown action `{action_raw}`")))?;

    Ok(ApprovalHistoryEntry {
        id: col(row, "id")?,
        run_id: RunId(col(row, "run_id")?),
        tenant_id: tenant_id(row)?,
        action,
        actor: col(row, "actor")?,
        notes: col(row, "notes")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn decode_request(row: &SqliteRow) -> Result<PriceRequest, WorkflowError> {
    Ok(PriceRequest {
        id: RequestId(col(row, "id")?),
        tenant_id: tenant_id(row)?,
        customer_ref: col(row, "customer_ref")?,
        title: col(row, "title")?,
        created_by: col(row, "created_by")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub(crate) fn decode_line_item(row: &SqliteRow) -> Result<RequestLineItem, WorkflowError> {
    Ok(RequestLineItem {
        id: LineItemId(col(row, "id")?),
        request_id: RequestId(col(row, "request_id")?),
        tenant_id: tenant_id(row)?,
        catalog_ref: col(row, "catalog_ref")?,
        description: col(row, "description")?,
        quantity: col(row, "quantity")?,
        uom: col(row, "uom")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub(crate) async fn fetch_run<'e, E>(
    executor: E,
    run_id: &RunId,
    tenant: &TenantId,
) -> Result<Option<PricingRun>, WorkflowError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let sql = format!("SELECT {RUN_COLUMNS} FROM pricing_run WHERE id = ? AND tenant_id = ?");
    let row = sqlx::query(&sql)
        .bind(&run_id.0)
        .bind(tenant.as_str())
        .fetch_optional(executor)
        .await
        .map_err(db_err)?;
    row.as_ref().map(decode_run).transpose()
}

pub(crate) async fn fetch_current_run<'e, E>(
    executor: E,
    request_id: &RequestId,
    tenant: &TenantId,
) -> Result<Option<PricingRun>, WorkflowError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let sql = format!(
        "SELECT {RUN_COLUMNS} FROM pricing_run \
         WHERE request_id = ? AND tenant_id = ? AND is_current = 1"
    );
    let row = sqlx::query(&sql)
        .bind(&request_id.0)
        .bind(tenant.as_str())
        .fetch_optional(executor)
        .await
        .map_err(db_err)?;
    row.as_ref().map(decode_run).transpose()
}

pub(crate) async fn fetch_run_items<'e, E>(
    executor: E,
    run_id: &RunId,
    tenant: &TenantId,
) -> Result<Vec<PricingRunItem>, WorkflowError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let sql = format!(
        "SELECT {RUN_ITEM_COLUMNS} FROM pricing_run_item \
         WHERE run_id = ? AND tenant_id = ? ORDER BY line_item_id"
    );
    let rows = sqlx::query(&sql)
        .bind(&run_id.0)
        .bind(tenant.as_str())
        .fetch_all(executor)
        .await
        .map_err(db_err)?;
    rows.iter().map(decode_run_item).collect()
}

pub(crate) async fn fetch_line_items<'e, E>(
    executor: E,
    request_id: &RequestId,
    tenant: &TenantId,
) -> Result<Vec<RequestLineItem>, WorkflowError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let rows = sqlx::query(
        "SELECT id, request_id, tenant_id, catalog_ref, description, quantity, uom,
                created_at, updated_at
         FROM request_line_item
         WHERE request_id = ? AND tenant_id = ?
         ORDER BY id",
    )
    .bind(&request_id.0)
    .bind(tenant.as_str())
    .fetch_all(executor)
    .await
    .map_err(db_err)?;
    rows.iter().map(decode_line_item).collect()
}

pub(crate) async fn request_exists<'e, E>(
    executor: E,
    request_id: &RequestId,
    tenant: &TenantId,
) -> Result<bool, WorkflowError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let exists: i64 = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM price_request WHERE id = ? AND tenant_id = ?)",
    )
    .bind(&request_id.0)
    .bind(tenant.as_str())
    .fetch_one(executor)
    .await
    .map_err(db_err)?;
    Ok(exists == 1)
}
