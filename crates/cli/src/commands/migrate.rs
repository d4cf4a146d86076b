use pricerun_db::migrations;

use crate::commands::{CommandFailure, CommandResult, DbSession, FailureClass};

pub fn run() -> CommandResult {
    match apply() {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => CommandResult::failure("migrate", failure),
    }
}

fn apply() -> Result<(), CommandFailure> {
    let session = DbSession::open()?;
    let pool = session.connect()?;

    session.runtime.block_on(async {
        let result = migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandFailure::new(FailureClass::Migration, error));
        pool.close().await;
        result
    })
}
