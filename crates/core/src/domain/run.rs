use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::WorkflowError;
use crate::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn generate() -> Self {
        Self(format!("run-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineItemId(pub String);

/// Workflow state of a single pricing run.
///
/// All legality checks go through [`ApprovalStatus::can_transition_to`];
/// nothing else in the workspace compares status strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "pending_approval" => Some(Self::PendingApproval),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::PendingApproval)
                | (Self::PendingApproval, Self::Approved)
                | (Self::PendingApproval, Self::Rejected)
        )
    }

    /// Approved and rejected runs only leave their state through a new
    /// version, never through another transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// Commercial result of a run, recorded independently of approval state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Won,
    Lost,
    Cancelled,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, WorkflowError> {
        match value {
            "pending" => Ok(Self::Pending),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(WorkflowError::validation(format!(
                "unknown outcome `{other}` (expected pending|won|lost|cancelled)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Submitted,
    Approved,
    Rejected,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// How a line's cost basis was obtained when the run was priced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMethod {
    Catalog,
    Manual,
    Estimated,
}

impl PricingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Manual => "manual",
            Self::Estimated => "estimated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "catalog" => Some(Self::Catalog),
            "manual" => Some(Self::Manual),
            "estimated" => Some(Self::Estimated),
            _ => None,
        }
    }
}

/// One versioned attempt at pricing a request's line items.
///
/// Runs are inserted by version creation and mutated only through the lock,
/// approval and outcome paths; they are never physically deleted, so the
/// version history stays auditable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRun {
    pub id: RunId,
    pub request_id: RequestId,
    pub tenant_id: TenantId,
    pub version_number: i64,
    pub is_current: bool,
    pub approval_status: ApprovalStatus,
    pub outcome: Option<Outcome>,
    pub outcome_date: Option<DateTime<Utc>>,
    pub outcome_reason: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub superseded_reason: Option<String>,
    pub total_price: Decimal,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl PricingRun {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }
}

/// Frozen line-level price breakdown belonging to exactly one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRunItem {
    pub id: String,
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub line_item_id: LineItemId,
    pub catalog_ref: String,
    pub description: String,
    pub quantity: i64,
    pub base_cost: Decimal,
    pub unit_price: Decimal,
    pub markup_pct: Decimal,
    pub logistics_cost: Decimal,
    pub risk_cost: Decimal,
    pub pricing_method: PricingMethod,
    pub line_total: Decimal,
}

/// Append-only audit record for approval decisions on a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalHistoryEntry {
    pub id: String,
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub action: ApprovalAction,
    pub actor: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalHistoryEntry {
    pub fn record(
        run: &PricingRun,
        action: ApprovalAction,
        actor: impl Into<String>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: format!("aph-{}", Uuid::new_v4()),
            run_id: run.id.clone(),
            tenant_id: run.tenant_id.clone(),
            action,
            actor: actor.into(),
            notes,
            created_at: Utc::now(),
        }
    }
}

/// Point-in-time view of a run with its items. Derived on demand: items are
/// frozen at version creation, so the live rows are the snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub run: PricingRun,
    pub items: Vec<PricingRunItem>,
}

impl VersionSnapshot {
    /// Sum of per-unit cost basis across all lines.
    pub fn cost_basis(&self) -> Decimal {
        self.items.iter().map(|item| item.base_cost * Decimal::from(item.quantity)).sum()
    }

    /// Margin over cost as a percentage of total price; zero-total runs
    /// report zero margin rather than dividing by zero.
    pub fn effective_margin_pct(&self) -> Decimal {
        if self.run.total_price.is_zero() {
            return Decimal::ZERO;
        }
        let margin = self.run.total_price - self.cost_basis();
        (margin / self.run.total_price * Decimal::from(100)).round_dp(2)
    }
}
