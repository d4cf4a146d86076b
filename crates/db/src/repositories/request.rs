use async_trait::async_trait;
use chrono::Utc;

use pricerun_core::domain::request::{PriceRequest, RequestLineItem};
use pricerun_core::domain::run::{LineItemId, RequestId};
use pricerun_core::errors::WorkflowError;
use pricerun_core::tenant::TenantId;
use pricerun_core::workflow::{LineItemEdit, RequestStore};

use super::rows;
use crate::DbPool;

/// Tenant-scoped access to price requests and their line items.
///
/// Line-item writes check the current run's lock first: once a run is
/// locked, the request's inputs stay frozen until a new version supersedes
/// it, so reviewed numbers cannot drift under the reviewer.
pub struct SqlRequestStore {
    pool: DbPool,
}

impl SqlRequestStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for SqlRequestStore {
    async fn find_request(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
    ) -> Result<PriceRequest, WorkflowError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, customer_ref, title, created_by, created_at, updated_at
             FROM price_request WHERE id = ? AND tenant_id = ?",
        )
        .bind(&request_id.0)
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(rows::db_err)?;

        row.as_ref()
            .map(rows::decode_request)
            .transpose()?
            .ok_or(WorkflowError::NotFound { resource: "price request" })
    }

    async fn list_line_items(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
    ) -> Result<Vec<RequestLineItem>, WorkflowError> {
        if !rows::request_exists(&self.pool, request_id, tenant).await? {
            return Err(WorkflowError::NotFound { resource: "price request" });
        }
        rows::fetch_line_items(&self.pool, request_id, tenant).await
    }

    async fn update_line_item(
        &self,
        request_id: &RequestId,
        item_id: &LineItemId,
        tenant: &TenantId,
        edit: LineItemEdit,
    ) -> Result<RequestLineItem, WorkflowError> {
        let mut tx = self.pool.begin().await.map_err(rows::db_err)?;

        if let Some(run) = rows::fetch_current_run(&mut *tx, request_id, tenant).await? {
            if let Some(locked_at) = run.locked_at {
                return Err(WorkflowError::Locked { locked_at, locked_by: run.locked_by });
            }
        }

        let row = sqlx::query(
            "SELECT id, request_id, tenant_id, catalog_ref, description, quantity, uom,
                    created_at, updated_at
             FROM request_line_item WHERE id = ? AND request_id = ? AND tenant_id = ?",
        )
        .bind(&item_id.0)
        .bind(&request_id.0)
        .bind(tenant.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(rows::db_err)?;

        let item = row
            .as_ref()
            .map(rows::decode_line_item)
            .transpose()?
            .ok_or(WorkflowError::NotFound { resource: "request line item" })?;

        let catalog_ref = match edit.catalog_ref {
            Some(value) => {
                let trimmed = value.trim().to_string();
                if trimmed.is_empty() {
                    return Err(WorkflowError::validation("catalog_ref must not be empty"));
                }
                trimmed
            }
            None => item.catalog_ref,
        };
        let description = edit.description.unwrap_or(item.description);
        let quantity = edit.quantity.unwrap_or(item.quantity);
        if quantity <= 0 {
            return Err(WorkflowError::validation("quantity must be greater than zero"));
        }

        sqlx::query(
            "UPDATE request_line_item
             SET catalog_ref = ?, description = ?, quantity = ?, updated_at = ?
             WHERE id = ? AND request_id = ? AND tenant_id = ?",
        )
        .bind(&catalog_ref)
        .bind(&description)
        .bind(quantity)
        .bind(Utc::now().to_rfc3339())
        .bind(&item_id.0)
        .bind(&request_id.0)
        .bind(tenant.as_str())
        .execute(&mut *tx)
        .await
        .map_err(rows::db_err)?;

        tx.commit().await.map_err(rows::db_err)?;

        let items = rows::fetch_line_items(&self.pool, request_id, tenant).await?;
        items
            .into_iter()
            .find(|line| &line.id == item_id)
            .ok_or_else(|| WorkflowError::internal("updated line item disappeared"))
    }
}
