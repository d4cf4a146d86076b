use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::run::{LineItemId, RequestId};
use crate::tenant::TenantId;

/// The commercial ask being priced. Requests are owned by an upstream
/// intake surface; this subsystem only reads them and guards their line
/// items while a pricing run is locked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRequest {
    pub id: RequestId,
    pub tenant_id: TenantId,
    pub customer_ref: Option<String>,
    pub title: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One priceable line of a request. Quantity and catalog reference feed the
/// pricing collaborator at version-creation time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLineItem {
    pub id: LineItemId,
    pub request_id: RequestId,
    pub tenant_id: TenantId,
    pub catalog_ref: String,
    pub description: String,
    pub quantity: i64,
    pub uom: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
