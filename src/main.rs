use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod catalog;
mod config;
mod db;
mod error;
mod messaging;
mod metrics;
mod models;
mod service;
#[cfg(test)]
mod testing;
mod utils;

use api::AppState;
use catalog::CatalogClient;
use config::Config;
use db::PgOrderStore;
use messaging::KafkaPublisher;
use service::OrderService;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging with environment-based filtering.
    // Override with RUST_LOG, e.g. RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_service=debug")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("🚀 Starting order service");

    // === 1. PostgreSQL pool + schema ===
    tracing::info!("Connecting to PostgreSQL...");
    let pool = db::connect(
        &config.database_url,
        config.db_max_connections,
        config.db_timeout(),
    )
    .await
    .context("connecting to PostgreSQL")?;
    db::ensure_schema(&pool).await.context("ensuring orders schema")?;

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created");

    // === 3. Collaborators: catalog verifier, order store, event publisher ===
    let verifier = CatalogClient::new(&config.catalog_base_url, config.catalog_timeout())
        .context("building catalog client")?;
    let store = PgOrderStore::new(pool.clone(), config.db_timeout());
    let publisher = Arc::new(
        KafkaPublisher::new(&config.kafka_brokers, config.publish_timeout(), metrics.clone())
            .context("building Kafka producer")?,
    );

    // === 4. Order service + HTTP server ===
    let service = OrderService::new(
        Arc::new(verifier),
        Arc::new(store),
        publisher.clone(),
        config.order_events_topic.clone(),
        metrics.clone(),
    );
    let state = web::Data::new(AppState { service, metrics });

    tracing::info!(
        bind_addr = %config.bind_addr,
        events_topic = %config.order_events_topic,
        "HTTP server listening"
    );
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(api::json_config())
            .configure(api::configure)
    })
    .bind(config.bind_addr.as_str())?
    .run()
    .await?;

    // === 5. Graceful teardown ===
    tracing::info!("Draining producer and closing the database pool");
    publisher.flush(Duration::from_secs(5));
    pool.close().await;

    tracing::info!("👋 Order service stopped");
    Ok(())
}
