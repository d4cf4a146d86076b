pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{RequestSeedInfo, SeedDataset, SeedResult, VerificationResult};
pub use repositories::{
    SqlApprovalStore, SqlLockStore, SqlRequestStore, SqlTenantResolver, SqlVersionStore,
};
