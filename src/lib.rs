//! Storefront Checkout
//!
//! Order total computation and idempotent order placement for a
//! single-product storefront.
//!
//! ## Features
//! - Checkout form controller with validation and a local price preview
//! - Idempotent order placement over HTTP, guest or signed in
//! - Placement endpoint computing authoritative totals
//! - Shipping prefill from the shopper's latest order
//! - Postgres or in-memory order storage, optional NATS order events

pub mod client;
pub mod config;
pub mod domain;
pub mod server;

pub use client::{CheckoutController, CheckoutError, CheckoutView, HttpOrderGateway, KeyPolicy};
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use domain::aggregates::{OrderConfirmation, OrderRequest, ShippingAddress, ShippingField};
pub use domain::pricing::{PriceBreakdown, PricingRules};
pub use server::{router, AppState};
