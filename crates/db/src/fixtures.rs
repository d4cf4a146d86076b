use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Canonical seed contract: one priceable request per tenant.
const SEED_REQUESTS: &[SeedRequestContract] = &[
    SeedRequestContract {
        tenant_id: "acme-industrial",
        request_id: "req-acme-boiler-001",
        expected_line_count: 3,
        description: "Boiler house retrofit, phase 1",
    },
    SeedRequestContract {
        tenant_id: "borealis-energy",
        request_id: "req-borealis-pipeline-001",
        expected_line_count: 2,
        description: "Compressor station tie-in",
    },
];

const SEED_TENANT_IDS: &[&str] = &["acme-industrial", "borealis-energy"];

/// Deterministic demo fixtures for local development and the seed command.
///
/// Seeds tenants, requests, and line items only; pricing runs are created
/// through the workflow so seeded databases start from a clean version
/// history.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/seed_data.sql");

    /// Load the seed dataset. Idempotent: fixture rows carry fixed ids and
    /// the SQL upserts on them.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let requests_seeded = SEED_REQUESTS
            .iter()
            .map(|request| RequestSeedInfo {
                tenant_id: request.tenant_id,
                request_id: request.request_id,
                description: request.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { requests_seeded })
    }

    /// Verify that the seed rows exist and match the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for tenant_id in SEED_TENANT_IDS {
            let present: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tenant WHERE id = ?)")
                .bind(tenant_id)
                .fetch_one(pool)
                .await?;
            checks.push((*tenant_id, present == 1));
        }

        for request in SEED_REQUESTS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM price_request WHERE id = ? AND tenant_id = ?)",
            )
            .bind(request.request_id)
            .bind(request.tenant_id)
            .fetch_one(pool)
            .await?;
            checks.push((request.request_id, present == 1));

            let line_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM request_line_item WHERE request_id = ? AND tenant_id = ?",
            )
            .bind(request.request_id)
            .bind(request.tenant_id)
            .fetch_one(pool)
            .await?;
            checks.push((request.line_count_label(), line_count == request.expected_line_count));
        }

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

struct SeedRequestContract {
    tenant_id: &'static str,
    request_id: &'static str,
    expected_line_count: i64,
    description: &'static str,
}

impl SeedRequestContract {
    fn line_count_label(&self) -> &'static str {
        match self.request_id {
            "req-acme-boiler-001" => "req-acme-boiler-001-lines",
            _ => "req-borealis-pipeline-001-lines",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestSeedInfo {
    pub tenant_id: &'static str,
    pub request_id: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct SeedResult {
    pub requests_seeded: Vec<RequestSeedInfo>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
