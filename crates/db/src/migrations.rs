use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "tenant",
        "price_request",
        "request_line_item",
        "pricing_run",
        "pricing_run_item",
        "approval_history",
        "idx_price_request_tenant_id",
        "idx_request_line_item_request_id",
        "idx_request_line_item_tenant_id",
        "idx_pricing_run_request_id",
        "idx_pricing_run_tenant_id",
        "idx_pricing_run_current",
        "idx_pricing_run_item_run_id",
        "idx_approval_history_run_id",
    ];

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in
            ["tenant", "price_request", "request_line_item", "pricing_run", "pricing_run_item", "approval_history"]
        {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .expect("check table")
            .get::<i64, _>("count");
            assert_eq!(count, 1, "table `{table}` should exist after migration");
        }
    }

    #[tokio::test]
    async fn current_run_uniqueness_is_enforced_by_the_store() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query("INSERT INTO tenant (id, name, created_at) VALUES ('t-1', 'Tenant One', '2026-01-01T00:00:00Z')")
            .execute(&pool)
            .await
            .expect("insert tenant");
        sqlx::query(
            "INSERT INTO price_request (id, tenant_id, title, created_by, created_at, updated_at)
             VALUES ('req-1', 't-1', 'Boiler retrofit', 'seed', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert request");

        let insert_run = |id: &'static str, version: i64| {
            let pool = pool.clone();
            async move {
                sqlx::query(
                    "INSERT INTO pricing_run
                       (id, request_id, tenant_id, version_number, is_current, total_price, created_by, created_at)
                     VALUES (?, 'req-1', 't-1', ?, 1, '100.00', 'seed', '2026-01-01T00:00:00Z')",
                )
                .bind(id)
                .bind(version)
                .execute(&pool)
                .await
            }
        };

        insert_run("run-1", 1).await.expect("first current run");
        let second = insert_run("run-2", 2).await;
        assert!(second.is_err(), "partial unique index should reject a second current run");
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let run_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = 'pricing_run'",
        )
        .fetch_one(&pool)
        .await
        .expect("check pricing_run table removed")
        .get::<i64, _>("count");

        assert_eq!(run_count, 0);
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
