//! Domain events
use serde::Serialize;
use uuid::Uuid;

pub const ORDER_PLACED_SUBJECT: &str = "ecommerce.orders.placed";

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: String, user_id: Option<Uuid>, quantity: u32, total_cents: i64 },
}

impl OrderEvent {
    pub fn subject(&self) -> &'static str {
        match self { Self::Placed { .. } => ORDER_PLACED_SUBJECT }
    }
}
