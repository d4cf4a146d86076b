use pricerun_db::{migrations, DbPool, SeedDataset};

use crate::commands::{CommandFailure, CommandResult, DbSession, FailureClass};

pub fn run() -> CommandResult {
    match load() {
        Ok(summary) => CommandResult::success("seed", summary),
        Err(failure) => CommandResult::failure("seed", failure),
    }
}

fn load() -> Result<String, CommandFailure> {
    let session = DbSession::open()?;
    let pool = session.connect()?;

    session.runtime.block_on(async {
        let result = migrate_and_seed(&pool).await;
        pool.close().await;
        result
    })
}

async fn migrate_and_seed(pool: &DbPool) -> Result<String, CommandFailure> {
    migrations::run_pending(pool)
        .await
        .map_err(|error| CommandFailure::new(FailureClass::Migration, error))?;

    let loaded = SeedDataset::load(pool)
        .await
        .map_err(|error| CommandFailure::new(FailureClass::SeedExecution, error))?;

    let verification = SeedDataset::verify(pool)
        .await
        .map_err(|error| CommandFailure::new(FailureClass::SeedVerification, error))?;
    if !verification.all_present {
        let failed_checks: Vec<&str> = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect();
        let message = if failed_checks.is_empty() {
            "Some seed data failed to load".to_string()
        } else {
            format!("Seed verification failed for checks: {}", failed_checks.join(", "))
        };
        return Err(CommandFailure::new(FailureClass::SeedVerification, message));
    }

    let request_lines: Vec<String> = loaded
        .requests_seeded
        .iter()
        .map(|info| format!("  - {}: {} ({})", info.tenant_id, info.request_id, info.description))
        .collect();
    Ok(format!(
        "Seed dataset loaded for {} tenant-scoped requests:\n{}",
        loaded.requests_seeded.len(),
        request_lines.join("\n")
    ))
}
