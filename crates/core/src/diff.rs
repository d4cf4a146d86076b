use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::run::{LineItemId, PricingRunItem, RequestId, VersionSnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemChange {
    Added,
    Removed,
    Changed,
    Unchanged,
}

/// Per-line delta between two versions, keyed by the request line's stable
/// identity rather than the run-item row id (which differs per version).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDelta {
    pub line_item_id: LineItemId,
    pub description: String,
    pub change: ItemChange,
    pub quantity_from: Option<i64>,
    pub quantity_to: Option<i64>,
    pub quantity_delta: i64,
    pub unit_price_from: Option<Decimal>,
    pub unit_price_to: Option<Decimal>,
    pub unit_price_delta: Decimal,
    pub line_total_delta: Decimal,
}

/// Structural diff between two versions of the same request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDiff {
    pub request_id: RequestId,
    pub from_version: i64,
    pub to_version: i64,
    pub total_price_from: Decimal,
    pub total_price_to: Decimal,
    pub total_price_delta: Decimal,
    pub margin_pct_from: Decimal,
    pub margin_pct_to: Decimal,
    pub margin_pct_delta: Decimal,
    pub items: Vec<ItemDelta>,
}

/// Compares two snapshots of one request. Comparing a version to itself
/// yields all-zero deltas; items only present on one side show up as
/// `Added`/`Removed` with the full amount as the delta.
pub fn compare_snapshots(from: &VersionSnapshot, to: &VersionSnapshot) -> VersionDiff {
    let from_items: BTreeMap<&LineItemId, &PricingRunItem> =
        from.items.iter().map(|item| (&item.line_item_id, item)).collect();
    let to_items: BTreeMap<&LineItemId, &PricingRunItem> =
        to.items.iter().map(|item| (&item.line_item_id, item)).collect();

    let mut items = Vec::with_capacity(from_items.len().max(to_items.len()));
    for (line_item_id, old) in &from_items {
        match to_items.get(*line_item_id) {
            Some(new) => items.push(delta_for_pair(old, new)),
            None => items.push(delta_for_removed(old)),
        }
    }
    for (line_item_id, new) in &to_items {
        if !from_items.contains_key(*line_item_id) {
            items.push(delta_for_added(new));
        }
    }

    let margin_from = from.effective_margin_pct();
    let margin_to = to.effective_margin_pct();

    VersionDiff {
        request_id: to.run.request_id.clone(),
        from_version: from.run.version_number,
        to_version: to.run.version_number,
        total_price_from: from.run.total_price,
        total_price_to: to.run.total_price,
        total_price_delta: to.run.total_price - from.run.total_price,
        margin_pct_from: margin_from,
        margin_pct_to: margin_to,
        margin_pct_delta: margin_to - margin_from,
        items,
    }
}

fn delta_for_pair(old: &PricingRunItem, new: &PricingRunItem) -> ItemDelta {
    let quantity_delta = new.quantity - old.quantity;
    let unit_price_delta = new.unit_price - old.unit_price;
    let line_total_delta = new.line_total - old.line_total;
    let change = if quantity_delta == 0
        && unit_price_delta.is_zero()
        && line_total_delta.is_zero()
    {
        ItemChange::Unchanged
    } else {
        ItemChange::Changed
    };

    ItemDelta {
        line_item_id: new.line_item_id.clone(),
        description: new.description.clone(),
        change,
        quantity_from: Some(old.quantity),
        quantity_to: Some(new.quantity),
        quantity_delta,
        unit_price_from: Some(old.unit_price),
        unit_price_to: Some(new.unit_price),
        unit_price_delta,
        line_total_delta,
    }
}

fn delta_for_removed(old: &PricingRunItem) -> ItemDelta {
    ItemDelta {
        line_item_id: old.line_item_id.clone(),
        description: old.description.clone(),
        change: ItemChange::Removed,
        quantity_from: Some(old.quantity),
        quantity_to: None,
        quantity_delta: -old.quantity,
        unit_price_from: Some(old.unit_price),
        unit_price_to: None,
        unit_price_delta: -old.unit_price,
        line_total_delta: -old.line_total,
    }
}

fn delta_for_added(new: &PricingRunItem) -> ItemDelta {
    ItemDelta {
        line_item_id: new.line_item_id.clone(),
        description: new.description.clone(),
        change: ItemChange::Added,
        quantity_from: None,
        quantity_to: Some(new.quantity),
        quantity_delta: new.quantity,
        unit_price_from: None,
        unit_price_to: Some(new.unit_price),
        unit_price_delta: new.unit_price,
        line_total_delta: new.line_total,
    }
}
