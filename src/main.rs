//! Storefront Checkout - order placement endpoint

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use storefront_checkout::server::{self, AppState, MemoryOrderStore, OrderStore, PgOrderStore};
use storefront_checkout::ServerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    let store = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            OrderStore::Postgres(PgOrderStore::new(db, config.order_prefix.clone(), config.order_number_start).await?)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory");
            OrderStore::Memory(Arc::new(MemoryOrderStore::new(config.order_prefix.clone(), config.order_number_start)))
        }
    };

    let events = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, order events disabled");
                None
            }
        },
        None => None,
    };

    let state = AppState { store, pricing: config.pricing.clone(), max_quantity: config.max_quantity, events };
    let app = server::router(state);

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "storefront checkout listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
