use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use pricerun_core::diff::{compare_snapshots, VersionDiff};
use pricerun_core::domain::run::{
    ApprovalStatus, PricingRun, RequestId, RunId, VersionSnapshot,
};
use pricerun_core::errors::WorkflowError;
use pricerun_core::pricing::{PriceCalculator, PricedLine};
use pricerun_core::tenant::TenantId;
use pricerun_core::workflow::{NewVersionOptions, VersionService};

use super::rows;
use crate::DbPool;

/// SQL-backed version manager for pricing runs.
///
/// All multi-row effects of version creation happen inside one transaction:
/// the request row is touched first so the writer lock serializes concurrent
/// creations per request, then the supersession gate is applied against the
/// current run observed under that lock, and the old current flag flips in
/// the same transaction that inserts the new run.
pub struct SqlVersionStore {
    pool: DbPool,
    calculator: Arc<dyn PriceCalculator>,
}

impl SqlVersionStore {
    pub fn new(pool: DbPool, calculator: Arc<dyn PriceCalculator>) -> Self {
        Self { pool, calculator }
    }

    async fn snapshot_for_run(
        &self,
        run: PricingRun,
        tenant: &TenantId,
    ) -> Result<VersionSnapshot, WorkflowError> {
        let items = rows::fetch_run_items(&self.pool, &run.id, tenant).await?;
        Ok(VersionSnapshot { run, items })
    }

    async fn current_snapshot(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
    ) -> Result<VersionSnapshot, WorkflowError> {
        let run = rows::fetch_current_run(&self.pool, request_id, tenant)
            .await?
            .ok_or(WorkflowError::NotFound { resource: "current pricing run" })?;
        self.snapshot_for_run(run, tenant).await
    }
}

#[async_trait]
impl VersionService for SqlVersionStore {
    async fn create_version(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
        options: NewVersionOptions,
    ) -> Result<VersionSnapshot, WorkflowError> {
        let mut tx = self.pool.begin().await.map_err(rows::db_err)?;

        // Touching the request row takes the write lock that makes the
        // load-decide-insert-flip sequence single-writer per request. It
        // doubles as the tenant-scoped existence check.
        let touched = sqlx::query(
            "UPDATE price_request SET updated_at = updated_at WHERE id = ? AND tenant_id = ?",
        )
        .bind(&request_id.0)
        .bind(tenant.as_str())
        .execute(&mut *tx)
        .await
        .map_err(rows::db_err)?;
        if touched.rows_affected() == 0 {
            return Err(WorkflowError::NotFound { resource: "price request" });
        }

        let lines = rows::fetch_line_items(&mut *tx, request_id, tenant).await?;
        if lines.is_empty() {
            return Err(WorkflowError::validation("request has no priceable line items"));
        }

        let current = rows::fetch_current_run(&mut *tx, request_id, tenant).await?;
        let superseded_reason = options
            .superseded_reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .map(str::to_string);

        if let Some(current_run) = &current {
            if current_run.approval_status == ApprovalStatus::Approved
                && (!options.has_reprice || superseded_reason.is_none())
            {
                return Err(WorkflowError::Conflict {
                    message: "cannot create new pricing run: an approved quote already exists"
                        .to_string(),
                });
            }
        }

        let version_number: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version_number), 0) + 1 FROM pricing_run
             WHERE request_id = ? AND tenant_id = ?",
        )
        .bind(&request_id.0)
        .bind(tenant.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(rows::db_err)?;

        let priced = self
            .calculator
            .price_lines(&lines)
            .map_err(|error| WorkflowError::validation(error.to_string()))?;
        let total_price: Decimal = priced.iter().map(|line| line.line_total).sum();

        // The old current flag must drop before the insert so the partial
        // unique index never observes two current rows.
        if let Some(current_run) = &current {
            sqlx::query("UPDATE pricing_run SET is_current = 0 WHERE id = ? AND tenant_id = ?")
                .bind(&current_run.id.0)
                .bind(tenant.as_str())
                .execute(&mut *tx)
                .await
                .map_err(rows::db_err)?;
        }

        let run_id = RunId::generate();
        let now = Utc::now();
        let created_by = options.created_by.unwrap_or_else(|| "system".to_string());

        sqlx::query(
            "INSERT INTO pricing_run
               (id, request_id, tenant_id, version_number, is_current, approval_status,
                superseded_reason, total_price, created_by, created_at)
             VALUES (?, ?, ?, ?, 1, 'draft', ?, ?, ?, ?)",
        )
        .bind(&run_id.0)
        .bind(&request_id.0)
        .bind(tenant.as_str())
        .bind(version_number)
        .bind(&superseded_reason)
        .bind(total_price.to_string())
        .bind(&created_by)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(rows::db_err)?;

        for line in &priced {
            insert_run_item(&mut tx, &run_id, tenant, line, &now.to_rfc3339()).await?;
        }

        tx.commit().await.map_err(rows::db_err)?;

        self.get_snapshot(request_id, version_number, tenant).await
    }

    async fn list_versions(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
    ) -> Result<Vec<PricingRun>, WorkflowError> {
        if !rows::request_exists(&self.pool, request_id, tenant).await? {
            return Err(WorkflowError::NotFound { resource: "price request" });
        }

        let sql = format!(
            "SELECT {} FROM pricing_run WHERE request_id = ? AND tenant_id = ?
             ORDER BY version_number DESC",
            rows::RUN_COLUMNS
        );
        let fetched = sqlx::query(&sql)
            .bind(&request_id.0)
            .bind(tenant.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(rows::db_err)?;
        fetched.iter().map(rows::decode_run).collect()
    }

    async fn get_snapshot(
        &self,
        request_id: &RequestId,
        version: i64,
        tenant: &TenantId,
    ) -> Result<VersionSnapshot, WorkflowError> {
        let sql = format!(
            "SELECT {} FROM pricing_run
             WHERE request_id = ? AND tenant_id = ? AND version_number = ?",
            rows::RUN_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&request_id.0)
            .bind(tenant.as_str())
            .bind(version)
            .fetch_optional(&self.pool)
            .await
            .map_err(rows::db_err)?;

        let run = row
            .as_ref()
            .map(rows::decode_run)
            .transpose()?
            .ok_or(WorkflowError::NotFound { resource: "pricing run version" })?;
        self.snapshot_for_run(run, tenant).await
    }

    async fn list_snapshots(
        &self,
        request_id: &RequestId,
        tenant: &TenantId,
    ) -> Result<Vec<VersionSnapshot>, WorkflowError> {
        let runs = self.list_versions(request_id, tenant).await?;
        let mut snapshots = Vec::with_capacity(runs.len());
        for run in runs {
            snapshots.push(self.snapshot_for_run(run, tenant).await?);
        }
        Ok(snapshots)
    }

    async fn compare_versions(
        &self,
        request_id: &RequestId,
        from_version: i64,
        to_version: Option<i64>,
        tenant: &TenantId,
    ) -> Result<VersionDiff, WorkflowError> {
        let from = self.get_snapshot(request_id, from_version, tenant).await?;
        let to = match to_version {
            Some(version) => self.get_snapshot(request_id, version, tenant).await?,
            None => self.current_snapshot(request_id, tenant).await?,
        };
        Ok(compare_snapshots(&from, &to))
    }

    async fn create_revision(
        &self,
        run_id: &RunId,
        tenant: &TenantId,
        reason: &str,
        created_by: Option<String>,
    ) -> Result<VersionSnapshot, WorkflowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::validation("revision reason must not be empty"));
        }

        let request_id: Option<String> =
            sqlx::query_scalar("SELECT request_id FROM pricing_run WHERE id = ? AND tenant_id = ?")
                .bind(&run_id.0)
                .bind(tenant.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(rows::db_err)?;
        let request_id =
            RequestId(request_id.ok_or(WorkflowError::NotFound { resource: "pricing run" })?);

        self.create_version(
            &request_id,
            tenant,
            NewVersionOptions {
                superseded_reason: Some(reason.to_string()),
                has_reprice: true,
                created_by,
            },
        )
        .await
    }
}

async fn insert_run_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    run_id: &RunId,
    tenant: &TenantId,
    line: &PricedLine,
    created_at: &str,
) -> Result<(), WorkflowError> {
    sqlx::query(
        "INSERT INTO pricing_run_item
           (id, run_id, tenant_id, line_item_id, catalog_ref, description, quantity,
            base_cost, unit_price, markup_pct, logistics_cost, risk_cost, pricing_method,
            line_total, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(format!("pri-{}", Uuid::new_v4()))
    .bind(&run_id.0)
    .bind(tenant.as_str())
    .bind(&line.line_item_id.0)
    .bind(&line.catalog_ref)
    .bind(&line.description)
    .bind(line.quantity)
    .bind(line.base_cost.to_string())
    .bind(line.unit_price.to_string())
    .bind(line.markup_pct.to_string())
    .bind(line.logistics_cost.to_string())
    .bind(line.risk_cost.to_string())
    .bind(line.pricing_method.as_str())
    .bind(line.line_total.to_string())
    .bind(created_at)
    .execute(&mut **tx)
    .await
    .map_err(rows::db_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use pricerun_core::domain::run::{ApprovalStatus, RequestId, RunId};
    use pricerun_core::pricing::RateBookCalculator;
    use pricerun_core::tenant::TenantId;
    use pricerun_core::workflow::{NewVersionOptions, VersionService};

    use super::SqlVersionStore;
    use crate::repositories::testsupport::{seed_line_item, seed_request, setup_pool};
    use crate::DbPool;

    fn tenant() -> TenantId {
        TenantId::parse("acme-industrial").expect("tenant")
    }

    fn store(pool: &DbPool) -> SqlVersionStore {
        let calculator = RateBookCalculator::default().with_rates([
            ("pipe-sch40", Decimal::new(100_00, 2)),
            ("flange-dn50", Decimal::new(25_00, 2)),
            ("valve-gate", Decimal::new(250_00, 2)),
        ]);
        SqlVersionStore::new(pool.clone(), Arc::new(calculator))
    }

    async fn seed_standard_request(pool: &DbPool) -> RequestId {
        seed_request(pool, "req-1", "acme-industrial").await;
        seed_line_item(pool, "li-1", "req-1", "acme-industrial", "pipe-sch40", 2).await;
        seed_line_item(pool, "li-2", "req-1", "acme-industrial", "flange-dn50", 4).await;
        seed_line_item(pool, "li-3", "req-1", "acme-industrial", "valve-gate", 1).await;
        RequestId("req-1".to_string())
    }

    async fn approve_directly(pool: &DbPool, run_id: &RunId) {
        sqlx::query("UPDATE pricing_run SET approval_status = 'approved' WHERE id = ?")
            .bind(&run_id.0)
            .execute(pool)
            .await
            .expect("force approval status");
    }

    #[tokio::test]
    async fn first_version_is_current_draft_number_one() {
        let pool = setup_pool().await;
        let request_id = seed_standard_request(&pool).await;

        let snapshot = store(&pool)
            .create_version(&request_id, &tenant(), NewVersionOptions::default())
            .await
            .expect("create first version");

        assert_eq!(snapshot.run.version_number, 1);
        assert!(snapshot.run.is_current);
        assert_eq!(snapshot.run.approval_status, ApprovalStatus::Draft);
        assert_eq!(snapshot.items.len(), 3);
        assert!(snapshot.run.total_price > Decimal::ZERO);
        assert_eq!(
            snapshot.run.total_price,
            snapshot.items.iter().map(|item| item.line_total).sum::<Decimal>()
        );
    }

    #[tokio::test]
    async fn unknown_request_fails_not_found() {
        let pool = setup_pool().await;
        crate::repositories::testsupport::seed_tenant(&pool, "acme-industrial").await;

        let error = store(&pool)
            .create_version(
                &RequestId("req-absent".to_string()),
                &tenant(),
                NewVersionOptions::default(),
            )
            .await
            .expect_err("absent request");

        assert_eq!(error.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn request_without_items_fails_validation() {
        let pool = setup_pool().await;
        seed_request(&pool, "req-empty", "acme-industrial").await;

        let error = store(&pool)
            .create_version(
                &RequestId("req-empty".to_string()),
                &tenant(),
                NewVersionOptions::default(),
            )
            .await
            .expect_err("no items");

        assert_eq!(error.code(), "VALIDATION");
    }

    #[tokio::test]
    async fn supersession_gate_blocks_and_permits() {
        let pool = setup_pool().await;
        let request_id = seed_standard_request(&pool).await;
        let store = store(&pool);

        let first = store
            .create_version(&request_id, &tenant(), NewVersionOptions::default())
            .await
            .expect("version 1");
        approve_directly(&pool, &first.run.id).await;

        let denied = store
            .create_version(&request_id, &tenant(), NewVersionOptions::default())
            .await
            .expect_err("approved current without permission");
        assert_eq!(denied.code(), "CONFLICT");

        let denied_blank_reason = store
            .create_version(
                &request_id,
                &tenant(),
                NewVersionOptions {
                    has_reprice: true,
                    superseded_reason: Some("   ".to_string()),
                    created_by: None,
                },
            )
            .await
            .expect_err("permission without a reason");
        assert_eq!(denied_blank_reason.code(), "CONFLICT");

        let second = store
            .create_version(
                &request_id,
                &tenant(),
                NewVersionOptions {
                    has_reprice: true,
                    superseded_reason: Some("price update".to_string()),
                    created_by: Some("estimator@acme".to_string()),
                },
            )
            .await
            .expect("supersession with permission and reason");

        assert_eq!(second.run.version_number, 2);
        assert!(second.run.is_current);
        assert_eq!(second.run.superseded_reason.as_deref(), Some("price update"));

        let versions = store.list_versions(&request_id, &tenant()).await.expect("list");
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version_number, 2);
        assert!(versions[0].is_current);
        assert!(!versions[1].is_current);
    }

    #[tokio::test]
    async fn rejected_current_does_not_arm_the_gate() {
        let pool = setup_pool().await;
        let request_id = seed_standard_request(&pool).await;
        let store = store(&pool);

        let first = store
            .create_version(&request_id, &tenant(), NewVersionOptions::default())
            .await
            .expect("version 1");
        sqlx::query("UPDATE pricing_run SET approval_status = 'rejected' WHERE id = ?")
            .bind(&first.run.id.0)
            .execute(&pool)
            .await
            .expect("force rejected status");

        let second = store
            .create_version(&request_id, &tenant(), NewVersionOptions::default())
            .await
            .expect("rejection requires no supersession permission");
        assert_eq!(second.run.version_number, 2);
    }

    #[tokio::test]
    async fn version_numbers_stay_gapless() {
        let pool = setup_pool().await;
        let request_id = seed_standard_request(&pool).await;
        let store = store(&pool);

        for _ in 0..4 {
            store
                .create_version(&request_id, &tenant(), NewVersionOptions::default())
                .await
                .expect("create version");
        }

        let versions = store.list_versions(&request_id, &tenant()).await.expect("list");
        let mut numbers: Vec<i64> = versions.iter().map(|run| run.version_number).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(versions.iter().filter(|run| run.is_current).count(), 1);
    }

    #[tokio::test]
    async fn self_comparison_is_all_zero() {
        let pool = setup_pool().await;
        let request_id = seed_standard_request(&pool).await;
        let store = store(&pool);

        store
            .create_version(&request_id, &tenant(), NewVersionOptions::default())
            .await
            .expect("version 1");

        let diff = store.compare_versions(&request_id, 1, Some(1), &tenant()).await.expect("diff");
        assert!(diff.total_price_delta.is_zero());
        assert!(diff.items.iter().all(|item| item.line_total_delta.is_zero()));
    }

    #[tokio::test]
    async fn comparison_defaults_to_the_current_version() {
        let pool = setup_pool().await;
        let request_id = seed_standard_request(&pool).await;
        let store = store(&pool);

        store
            .create_version(&request_id, &tenant(), NewVersionOptions::default())
            .await
            .expect("version 1");
        sqlx::query("UPDATE request_line_item SET quantity = 5 WHERE id = 'li-1'")
            .execute(&pool)
            .await
            .expect("bump quantity");
        store
            .create_version(&request_id, &tenant(), NewVersionOptions::default())
            .await
            .expect("version 2");

        let diff = store.compare_versions(&request_id, 1, None, &tenant()).await.expect("diff");
        assert_eq!(diff.from_version, 1);
        assert_eq!(diff.to_version, 2);
        assert!(diff.total_price_delta > Decimal::ZERO);

        let changed = diff
            .items
            .iter()
            .find(|delta| delta.line_item_id.0 == "li-1")
            .expect("li-1 delta present");
        assert_eq!(changed.quantity_delta, 3);
    }

    #[tokio::test]
    async fn missing_comparison_side_fails_not_found() {
        let pool = setup_pool().await;
        let request_id = seed_standard_request(&pool).await;
        let store = store(&pool);

        store
            .create_version(&request_id, &tenant(), NewVersionOptions::default())
            .await
            .expect("version 1");

        let error = store
            .compare_versions(&request_id, 1, Some(7), &tenant())
            .await
            .expect_err("missing version");
        assert_eq!(error.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn foreign_tenant_sees_nothing() {
        let pool = setup_pool().await;
        let request_id = seed_standard_request(&pool).await;
        crate::repositories::testsupport::seed_tenant(&pool, "borealis-energy").await;
        let store = store(&pool);

        store
            .create_version(&request_id, &tenant(), NewVersionOptions::default())
            .await
            .expect("version 1");

        let foreign = TenantId::parse("borealis-energy").expect("tenant");
        let listed = store.list_versions(&request_id, &foreign).await.expect_err("foreign list");
        assert_eq!(listed.code(), "NOT_FOUND");

        let snapshot =
            store.get_snapshot(&request_id, 1, &foreign).await.expect_err("foreign snapshot");
        assert_eq!(snapshot.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn revision_requires_a_reason_and_supersedes() {
        let pool = setup_pool().await;
        let request_id = seed_standard_request(&pool).await;
        let store = store(&pool);

        let first = store
            .create_version(&request_id, &tenant(), NewVersionOptions::default())
            .await
            .expect("version 1");
        approve_directly(&pool, &first.run.id).await;

        let blank = store
            .create_revision(&first.run.id, &tenant(), "  ", None)
            .await
            .expect_err("blank reason");
        assert_eq!(blank.code(), "VALIDATION");

        let revised = store
            .create_revision(&first.run.id, &tenant(), "customer asked for a retender", None)
            .await
            .expect("revision");
        assert_eq!(revised.run.version_number, 2);
        assert_eq!(
            revised.run.superseded_reason.as_deref(),
            Some("customer asked for a retender")
        );

        let absent = store
            .create_revision(&RunId("run-missing".to_string()), &tenant(), "reason", None)
            .await
            .expect_err("absent run");
        assert_eq!(absent.code(), "NOT_FOUND");
    }
}
