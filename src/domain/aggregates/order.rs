//! Order request and confirmation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::ShippingAddress;
use crate::domain::pricing::{HumanTotals, PriceBreakdown};
use crate::domain::value_objects::Money;

/// Source tag the storefront checkout attaches to every order.
pub const ORDER_SOURCE: &str = "site_checkout";

/// Body of a placement request. The idempotency key travels as a header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub user_id: Option<Uuid>,
    pub quantity: u32,
    pub shipping: ShippingAddress,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String { ORDER_SOURCE.to_string() }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Cancelled => "cancelled" }
    }

    pub fn parse(s: &str) -> Self {
        match s { "confirmed" => Self::Confirmed, "cancelled" => Self::Cancelled, _ => Self::Pending }
    }
}

/// Server-issued confirmation, rendered verbatim by the checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order: ConfirmedOrder,
    pub totals: ConfirmationTotals,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedOrder {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub order_number: String,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub placed_at: Option<DateTime<Utc>>,
}

/// Cent fields are optional: only the human strings are guaranteed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationTotals {
    #[serde(default)]
    pub subtotal_cents: Option<i64>,
    #[serde(default)]
    pub shipping_cents: Option<i64>,
    #[serde(default)]
    pub tax_cents: Option<i64>,
    #[serde(default)]
    pub total_cents: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    pub human: HumanTotals,
}

impl ConfirmationTotals {
    pub fn from_breakdown(b: &PriceBreakdown) -> Self {
        Self {
            subtotal_cents: Some(b.subtotal.cents()),
            shipping_cents: Some(b.shipping.cents()),
            tax_cents: Some(b.tax.cents()),
            total_cents: Some(b.total.cents()),
            currency: Some("USD".to_string()),
            human: b.human(),
        }
    }

    /// Numeric breakdown, when the server sent every cent field.
    pub fn breakdown(&self) -> Option<PriceBreakdown> {
        let (s, sh, t) = (self.subtotal_cents?, self.shipping_cents?, self.tax_cents?);
        Some(PriceBreakdown::new(Money::from_cents(s), Money::from_cents(sh), Money::from_cents(t)))
    }
}

/// A persisted order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedOrder {
    pub id: Uuid,
    pub order_number: String,
    pub idempotency_key: String,
    pub user_id: Option<Uuid>,
    pub quantity: u32,
    pub shipping: ShippingAddress,
    pub notes: String,
    pub source: String,
    pub totals: PriceBreakdown,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PlacedOrder {
    /// Whether a replayed request describes the same order.
    pub fn matches(&self, user_id: Option<Uuid>, request: &OrderRequest) -> bool {
        self.user_id == user_id
            && self.quantity == request.quantity
            && self.shipping == request.shipping
            && self.notes == request.notes
            && self.source == request.source
    }

    pub fn confirmation(&self) -> OrderConfirmation {
        OrderConfirmation {
            order: ConfirmedOrder {
                id: Some(self.id),
                order_number: self.order_number.clone(),
                status: self.status,
                placed_at: Some(self.placed_at),
            },
            totals: ConfirmationTotals::from_breakdown(&self.totals),
        }
    }
}
