use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use pricerun_core::config::{AppConfig, ConfigError, LoadOptions};
use pricerun_core::pricing::{PriceCalculator, RateBookCalculator};
use pricerun_core::tenant::{CachingTenantResolver, ResolverCacheSettings, TenantResolver};
use pricerun_db::{
    connect_with_settings, migrations, DbPool, SqlApprovalStore, SqlLockStore, SqlRequestStore,
    SqlTenantResolver, SqlVersionStore,
};

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let state = build_state(&config, &db_pool);
    Ok(Application { config, db_pool, state })
}

/// Wires the SQL stores behind the workflow traits. The tenant resolver is
/// the injected, TTL-bounded one: the cache lives on this value, not in any
/// process-global state.
pub fn build_state(config: &AppConfig, db_pool: &DbPool) -> AppState {
    let calculator: Arc<dyn PriceCalculator> = Arc::new(RateBookCalculator::default());
    let tenants: Arc<dyn TenantResolver> = Arc::new(CachingTenantResolver::new(
        SqlTenantResolver::new(db_pool.clone()),
        ResolverCacheSettings {
            ttl: Duration::from_secs(config.tenancy.resolver_cache_ttl_secs),
            capacity: config.tenancy.resolver_cache_capacity,
        },
    ));

    AppState {
        versions: Arc::new(SqlVersionStore::new(db_pool.clone(), calculator)),
        locks: Arc::new(SqlLockStore::new(db_pool.clone())),
        approvals: Arc::new(SqlApprovalStore::new(db_pool.clone())),
        requests: Arc::new(SqlRequestStore::new(db_pool.clone())),
        tenants,
    }
}

#[cfg(test)]
mod tests {
    use pricerun_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn memory_options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_connects_and_applies_migrations() {
        let app = bootstrap(memory_options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed against an in-memory database");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('tenant', 'price_request', 'pricing_run', 'approval_history')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables should exist after bootstrap");
        assert_eq!(table_count, 4, "bootstrap should expose the baseline workflow tables");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_configuration() {
        let result = bootstrap(memory_options("postgres://wrong-engine")).await;
        assert!(result.is_err(), "non-sqlite database urls must fail config validation");
    }
}
