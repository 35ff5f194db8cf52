//! Storefront cart service

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_cart::{
    api::{self, AppState},
    domain::events::EventPublisher,
    messaging::{NatsPublisher, NoopPublisher},
    repositories::postgres::{PgCartStore, PgCouponRepository, PgProductCatalog},
    AppConfig, ServiceContext,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();
    tracing::debug!(?config, "loaded configuration");

    let db = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_acquire_timeout)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client, config.events_subject_prefix.clone())),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, domain events disabled");
                Arc::new(NoopPublisher)
            }
        },
        None => Arc::new(NoopPublisher),
    };

    let ctx = ServiceContext::new(
        Arc::new(PgProductCatalog::new(db.clone())),
        Arc::new(PgCartStore::new(db.clone())),
        Arc::new(PgCouponRepository::new(db)),
        events,
    )
    .with_upstream_timeout(config.upstream_timeout);
    let app = api::router(AppState::new(ctx));

    tracing::info!("storefront cart listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal, starting graceful shutdown");
}
