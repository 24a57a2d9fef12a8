//! Storefront cart service

use std::sync::Arc;

use anyhow::Result;
use storefront_cart::events::EventPublisher;
use storefront_cart::server::{router, AppState, OfflineGateway, PaymentGateway, StripeGateway};
use storefront_cart::storage::{MemoryStore, PgStore, Store};
use storefront_cart::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url).await?;
            pg.migrate().await?;
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };
    let payments: Arc<dyn PaymentGateway> = match &config.stripe_secret_key {
        Some(key) => Arc::new(StripeGateway::new(key, &config.stripe_api_base)),
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, checkout sessions are simulated");
            Arc::new(OfflineGateway::new())
        }
    };
    let events = EventPublisher::connect(config.nats_url.as_deref()).await;

    let port = config.port;
    let app = router(AppState::new(store, payments, events, config));
    tracing::info!("Storefront cart listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
