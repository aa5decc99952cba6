// Tee Time booking and dynamic pricing service

pub mod booking;
pub mod catalog;
pub mod config;
pub mod coupons;
pub mod db;
pub mod error;
pub mod inventory;
pub mod metrics;
pub mod notifications;
pub mod pricing;
pub mod quotes;
pub mod timefmt;
pub mod validation;

use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use booking::{BookingCoordinator, BookingStore};
use catalog::{CatalogRepository, RuleCatalogStore};
use config::AppConfig;
use coupons::CouponValidator;
use inventory::TeeTimeInventory;
use metrics::PerformanceMetrics;
use notifications::NotificationDispatcher;
use pricing::{PriceCache, PricingEngine};
use quotes::QuoteService;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        inventory::handlers::list_tee_times,
        quotes::handlers::create_quote,
        coupons::handlers::validate_coupon,
        booking::handlers::create_booking,
    ),
    components(schemas(
        inventory::TeeTimeView,
        inventory::SlotStatus,
        quotes::QuoteRequest,
        quotes::Quote,
        coupons::Coupon,
        coupons::DiscountType,
        coupons::CouponRejection,
        coupons::models::ValidateCouponRequest,
        coupons::models::ValidateCouponResponse,
        booking::handlers::CheckoutRequest,
        booking::Customer,
        booking::BookingReceipt,
        error::ErrorResponse,
    )),
    tags(
        (name = "tee-times", description = "Tee-time inventory and priced listings"),
        (name = "quotes", description = "Signed price quotes"),
        (name = "coupons", description = "Coupon validation"),
        (name = "bookings", description = "Checkout and reservation")
    ),
    info(
        title = "Tee Time API",
        version = "0.1.0",
        description = "Golf tee-time inventory, dynamic pricing and transactional booking"
    )
)]
pub struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<TeeTimeInventory>,
    pub pricing: Arc<PricingEngine>,
    pub quotes: Arc<QuoteService>,
    pub coupons: Arc<CouponValidator>,
    pub bookings: Arc<BookingCoordinator>,
    pub catalog: Arc<RuleCatalogStore>,
    pub metrics: PerformanceMetrics,
}

impl AppState {
    /// Wire the services over the given store, catalog repository and price cache
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn BookingStore>,
        catalog_repository: Arc<dyn CatalogRepository>,
        price_cache: Arc<dyn PriceCache>,
        notifications: NotificationDispatcher,
    ) -> Self {
        let metrics = PerformanceMetrics::new();
        let catalog = Arc::new(RuleCatalogStore::with_ttl(
            catalog_repository,
            price_cache.clone(),
            config.pricing.catalog_ttl,
        ));
        let pricing = Arc::new(PricingEngine::new(
            catalog.clone(),
            price_cache,
            metrics.clone(),
        ));
        let inventory = Arc::new(TeeTimeInventory::new(
            store.clone(),
            catalog.clone(),
            pricing.clone(),
            config.inventory.clone(),
            metrics.clone(),
        ));
        let coupons = Arc::new(CouponValidator::new(store.clone(), config.coupons.clone()));
        let quotes = Arc::new(QuoteService::new(
            pricing.clone(),
            coupons.clone(),
            config.quotes.clone(),
            metrics.clone(),
        ));
        let bookings = Arc::new(BookingCoordinator::new(
            store,
            inventory.clone(),
            notifications,
            config.loyalty.clone(),
            config.reservations.clone(),
            metrics.clone(),
        ));

        Self {
            inventory,
            pricing,
            quotes,
            coupons,
            bookings,
            catalog,
            metrics,
        }
    }
}

/// Handler for GET /health
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "metrics": state.metrics.summary(),
    }))
}

/// Creates and configures the application router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .route(
            "/api/courses/:course_id/tee-times",
            get(inventory::handlers::list_tee_times),
        )
        .route("/api/quotes", post(quotes::handlers::create_quote))
        .route("/api/coupons/validate", post(coupons::handlers::validate_coupon))
        .route("/api/bookings", post(booking::handlers::create_booking))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
