//! Aggregates module
pub mod shipping;
pub mod order;

pub use shipping::{validate_shipping, ShippingAddress, ShippingField, ShippingValidationError, SUPPORTED_COUNTRY};
pub use order::{ConfirmationTotals, ConfirmedOrder, OrderConfirmation, OrderRequest, OrderStatus, PlacedOrder, ORDER_SOURCE};
