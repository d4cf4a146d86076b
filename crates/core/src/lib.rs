pub mod config;
pub mod diff;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod tenant;
pub mod workflow;

pub use diff::{compare_snapshots, ItemChange, ItemDelta, VersionDiff};
pub use domain::request::{PriceRequest, RequestLineItem};
pub use domain::run::{
    ApprovalAction, ApprovalHistoryEntry, ApprovalStatus, LineItemId, Outcome, PricingMethod,
    PricingRun, PricingRunItem, RequestId, RunId, VersionSnapshot,
};
pub use errors::{ErrorDetail, WorkflowError};
pub use pricing::{PriceCalculator, PricedLine, PricingError, RateBookCalculator};
pub use tenant::{
    CachingTenantResolver, ResolverCacheSettings, StaticTenantResolver, TenantId, TenantResolver,
};
pub use workflow::{
    ApprovalService, LineItemEdit, LockService, NewVersionOptions, OutcomeUpdate, RequestStore,
    VersionService,
};
