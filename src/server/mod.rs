//! Order placement endpoint.
pub mod error;
pub mod handlers;
pub mod store;

use axum::{routing::{get, post}, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::client::gateway::{LATEST_ORDER_PATH, PLACE_ORDER_PATH};
use crate::domain::pricing::PricingRules;

pub use error::ApiError;
pub use store::{MemoryOrderStore, OrderStore, PgOrderStore};

#[derive(Clone)]
pub struct AppState {
    pub store: OrderStore,
    pub pricing: PricingRules,
    pub max_quantity: u32,
    pub events: Option<async_nats::Client>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(PLACE_ORDER_PATH, post(handlers::place_order))
        .route(LATEST_ORDER_PATH, get(handlers::latest_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
