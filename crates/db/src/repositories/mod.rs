use thiserror::Error;

pub mod approval;
pub mod lock;
pub mod request;
mod rows;
pub mod tenant;
pub mod version;

pub use approval::SqlApprovalStore;
pub use lock::SqlLockStore;
pub use request::SqlRequestStore;
pub use tenant::SqlTenantResolver;
pub use version::SqlVersionStore;

/// Storage-layer failures raised by fixture loading. Workflow stores report
/// through `pricerun_core::WorkflowError` instead, so rule violations and
/// storage faults stay distinguishable at the boundary.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[cfg(test)]
pub(crate) mod testsupport {
    use crate::{connect_with_settings, migrations, DbPool};

    pub(crate) async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    pub(crate) async fn seed_tenant(pool: &DbPool, tenant_id: &str) {
        sqlx::query("INSERT OR IGNORE INTO tenant (id, name, created_at) VALUES (?, ?, ?)")
            .bind(tenant_id)
            .bind(format!("{tenant_id} (test)"))
            .bind("2026-01-01T00:00:00Z")
            .execute(pool)
            .await
            .expect("insert tenant");
    }

    pub(crate) async fn seed_request(pool: &DbPool, request_id: &str, tenant_id: &str) {
        seed_tenant(pool, tenant_id).await;
        sqlx::query(
            "INSERT INTO price_request (id, tenant_id, customer_ref, title, created_by, created_at, updated_at)
             VALUES (?, ?, NULL, ?, 'test', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .bind(request_id)
        .bind(tenant_id)
        .bind(format!("{request_id} (test request)"))
        .execute(pool)
        .await
        .expect("insert request");
    }

    pub(crate) async fn seed_line_item(
        pool: &DbPool,
        item_id: &str,
        request_id: &str,
        tenant_id: &str,
        catalog_ref: &str,
        quantity: i64,
    ) {
        sqlx::query(
            "INSERT INTO request_line_item
               (id, request_id, tenant_id, catalog_ref, description, quantity, uom, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 'ea', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .bind(item_id)
        .bind(request_id)
        .bind(tenant_id)
        .bind(catalog_ref)
        .bind(format!("{catalog_ref} line"))
        .bind(quantity)
        .execute(pool)
        .await
        .expect("insert line item");
    }
}
