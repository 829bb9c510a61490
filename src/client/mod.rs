//! Checkout form controller and its transport to the order endpoint.
pub mod controller;
pub mod error;
pub mod gateway;
pub mod view;

pub use controller::{CheckoutController, KeyPolicy};
pub use error::CheckoutError;
pub use gateway::{error_from_response, FixedSession, HttpOrderGateway, OrderGateway, Session, SessionProvider, IDEMPOTENCY_KEY_HEADER};
pub use view::{CheckoutView, OrderSummary};
