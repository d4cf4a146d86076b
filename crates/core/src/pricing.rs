use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::RequestLineItem;
use crate::domain::run::{LineItemId, PricingMethod};

/// Priced breakdown for one request line, produced by a [`PriceCalculator`]
/// at version-creation time and frozen into the run's items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
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

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("line item `{line_item_id}` has non-positive quantity {quantity}")]
    InvalidQuantity { line_item_id: String, quantity: i64 },
    #[error("no cost basis available for catalog ref `{catalog_ref}`")]
    MissingCostBasis { catalog_ref: String },
}

/// Pricing calculation collaborator. The actual cost model (catalog rates,
/// markups, logistics) lives behind this seam; the workflow only consumes
/// the resulting breakdowns.
pub trait PriceCalculator: Send + Sync {
    fn price_lines(&self, lines: &[RequestLineItem]) -> Result<Vec<PricedLine>, PricingError>;
}

/// Deterministic rate-book calculator.
///
/// Looks each catalog ref up in a fixed rate book; refs without an entry
/// fall back to a flat estimated rate when one is configured, otherwise the
/// line is unpriceable.
#[derive(Clone, Debug)]
pub struct RateBookCalculator {
    markup_pct: Decimal,
    logistics_pct: Decimal,
    risk_pct: Decimal,
    rates: HashMap<String, Decimal>,
    fallback_rate: Option<Decimal>,
}

impl Default for RateBookCalculator {
    fn default() -> Self {
        Self {
            markup_pct: Decimal::new(1800, 2),
            logistics_pct: Decimal::new(400, 2),
            risk_pct: Decimal::new(200, 2),
            rates: HashMap::new(),
            fallback_rate: Some(Decimal::new(10000, 2)),
        }
    }
}

impl RateBookCalculator {
    pub fn with_rates<I, S>(mut self, rates: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        self.rates.extend(rates.into_iter().map(|(key, rate)| (key.into(), rate)));
        self
    }

    pub fn with_fallback_rate(mut self, rate: Option<Decimal>) -> Self {
        self.fallback_rate = rate;
        self
    }

    fn cost_basis(&self, catalog_ref: &str) -> Option<(Decimal, PricingMethod)> {
        if let Some(rate) = self.rates.get(catalog_ref) {
            return Some((*rate, PricingMethod::Catalog));
        }
        self.fallback_rate.map(|rate| (rate, PricingMethod::Estimated))
    }
}

impl PriceCalculator for RateBookCalculator {
    fn price_lines(&self, lines: &[RequestLineItem]) -> Result<Vec<PricedLine>, PricingError> {
        let hundred = Decimal::from(100);
        lines
            .iter()
            .map(|line| {
                if line.quantity <= 0 {
                    return Err(PricingError::InvalidQuantity {
                        line_item_id: line.id.0.clone(),
                        quantity: line.quantity,
                    });
                }
                let (base_cost, pricing_method) =
                    self.cost_basis(&line.catalog_ref).ok_or_else(|| {
                        PricingError::MissingCostBasis { catalog_ref: line.catalog_ref.clone() }
                    })?;

                let quantity = Decimal::from(line.quantity);
                let unit_price =
                    (base_cost * (Decimal::ONE + self.markup_pct / hundred)).round_dp(2);
                let logistics_cost =
                    (base_cost * quantity * self.logistics_pct / hundred).round_dp(2);
                let risk_cost = (base_cost * quantity * self.risk_pct / hundred).round_dp(2);
                let line_total = (unit_price * quantity + logistics_cost + risk_cost).round_dp(2);

                Ok(PricedLine {
                    line_item_id: line.id.clone(),
                    catalog_ref: line.catalog_ref.clone(),
                    description: line.description.clone(),
                    quantity: line.quantity,
                    base_cost,
                    unit_price,
                    markup_pct: self.markup_pct,
                    logistics_cost,
                    risk_cost,
                    pricing_method,
                    line_total,
                })
            })
            .collect()
    }
}
