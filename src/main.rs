use std::sync::Arc;

use teetime_api::booking::{BookingStore, PgBookingStore};
use teetime_api::catalog::PgCatalogRepository;
use teetime_api::config::AppConfig;
use teetime_api::notifications::{
    LogNotificationSink, NotificationDispatcher, NotificationSink, RetryPolicy,
};
use teetime_api::pricing::{InMemoryPriceCache, PriceCache, RedisPriceCache};
use teetime_api::{create_router, db, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Tee Time API - Starting...");

    let config = AppConfig::from_env().expect("Invalid configuration");

    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let price_cache: Arc<dyn PriceCache> = match &config.redis_url {
        Some(url) => match RedisPriceCache::connect(url, config.pricing.price_cache_ttl).await {
            Ok(cache) => {
                tracing::info!("Using Redis price cache");
                Arc::new(cache)
            }
            Err(e) => {
                tracing::warn!("Redis unavailable ({}), falling back to in-process price cache", e);
                Arc::new(InMemoryPriceCache::new(config.pricing.price_cache_ttl))
            }
        },
        None => Arc::new(InMemoryPriceCache::new(config.pricing.price_cache_ttl)),
    };

    let sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(LogNotificationSink)];
    let notifications = NotificationDispatcher::start(sinks, RetryPolicy::default());

    let store: Arc<dyn BookingStore> = Arc::new(PgBookingStore::new(db_pool.clone()));
    let state = AppState::new(
        &config,
        store,
        Arc::new(PgCatalogRepository::new(db_pool)),
        price_cache,
        notifications,
    );

    // Periodic performance summary
    let metrics = state.metrics.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics.log_summary();
        }
    });

    let app = create_router(state);

    let addr = config.bind_address();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Tee Time API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");
}
