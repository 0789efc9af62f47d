//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Database reachability
//!
//! # Catalog
//! GET  /api/products                        - Filtered, sorted, paginated listing
//! GET  /api/products/featured               - Featured products
//! GET  /api/products/categories             - Category tree with counts
//! GET  /api/products/brands                 - Brand list
//! GET  /api/products/search                 - Quick search suggestions
//! GET  /api/products/{id}                   - Product detail
//!
//! # Customers (register/login rate limited, the rest require a bearer token)
//! POST /api/customers/register
//! POST /api/customers/login
//! GET  /api/customers/me
//! PUT  /api/customers/profile
//! PUT  /api/customers/password
//! GET  /api/customers/addresses             POST same path to create
//! PUT  /api/customers/addresses/{id}        DELETE same path to remove
//! PUT  /api/customers/addresses/{id}/default
//!
//! # Wishlist (bearer, except shared)
//! GET  /api/wishlist                        DELETE same path to clear
//! PUT  /api/wishlist/settings
//! POST /api/wishlist/items
//! DELETE /api/wishlist/items/{product_id}
//! POST /api/wishlist/toggle/{product_id}
//! GET  /api/wishlist/check/{product_id}
//! GET  /api/wishlist/shared/{share_token}
//!
//! # Notifications (bearer, except the VAPID key)
//! GET  /api/notifications/vapid-public-key
//! POST /api/notifications/subscribe
//! POST /api/notifications/unsubscribe
//! GET  /api/notifications/preferences       PUT same path to replace
//! GET  /api/notifications/history
//! GET  /api/notifications/stats
//! POST /api/notifications/test
//!
//! # Orders (bearer, except tracking)
//! POST /api/orders
//! GET  /api/orders/my
//! GET  /api/orders/{id}
//! GET  /api/orders/track/{tracking_code}
//! ```

pub mod customers;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod wishlist;

use axum::{
    Json, Router,
    extract::{FromRequest, FromRequestParts, State},
    http::{
        HeaderValue, Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, post, put},
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use stes_core::api::ApiResponse;

use crate::error::AppError;
use crate::middleware::{auth_rate_limiter, request_id_middleware};
use crate::state::AppState;

// =============================================================================
// Extractors and responses
// =============================================================================

/// JSON body extractor whose rejection is the JSON error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejection is the JSON error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query extractor whose rejection is the JSON error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Wrap a payload in the success envelope.
pub const fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok(data))
}

/// `201 Created` with the success envelope.
pub const fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

/// Payload of operations that only confirm success.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

// =============================================================================
// Routers
// =============================================================================

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/featured", get(products::featured))
        .route("/categories", get(products::categories))
        .route("/brands", get(products::brands))
        .route("/search", get(products::search))
        .route("/{id}", get(products::show))
}

/// Create the customer routes router.
///
/// Registration and login share one per-IP rate limiter.
pub fn customer_routes() -> Router<AppState> {
    let credentials = Router::new()
        .route("/register", post(customers::register))
        .route("/login", post(customers::login))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(credentials)
        .route("/me", get(customers::me))
        .route("/profile", put(customers::update_profile))
        .route("/password", put(customers::change_password))
        .route(
            "/addresses",
            get(customers::addresses).post(customers::create_address),
        )
        .route(
            "/addresses/{id}",
            put(customers::update_address).delete(customers::delete_address),
        )
        .route("/addresses/{id}/default", put(customers::set_default_address))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show).delete(wishlist::clear))
        .route("/settings", put(wishlist::update_settings))
        .route("/items", post(wishlist::add_item))
        .route("/items/{product_id}", axum::routing::delete(wishlist::remove_item))
        .route("/toggle/{product_id}", post(wishlist::toggle))
        .route("/check/{product_id}", get(wishlist::check))
        .route("/shared/{share_token}", get(wishlist::shared))
}

/// Create the notification routes router.
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/vapid-public-key", get(notifications::vapid_public_key))
        .route("/subscribe", post(notifications::subscribe))
        .route("/unsubscribe", post(notifications::unsubscribe))
        .route(
            "/preferences",
            get(notifications::preferences).put(notifications::update_preferences),
        )
        .route("/history", get(notifications::history))
        .route("/stats", get(notifications::stats))
        .route("/test", post(notifications::send_test))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::place))
        .route("/my", get(orders::mine))
        .route("/track/{tracking_code}", get(orders::track))
        .route("/{id}", get(orders::show))
}

/// Create all `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .nest("/customers", customer_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/notifications", notification_routes())
        .nest("/orders", order_routes())
}

/// Build the complete application: routes, middleware and state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config().frontend_url);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
        .fallback(|| async { AppError::NotFound("Route not found".to_owned()) })
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        customer_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// CORS limited to the configured frontend origin.
fn cors_layer(frontend_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(60 * 60));

    let origin = url::Url::parse(frontend_url)
        .ok()
        .map(|url| url.origin().ascii_serialization())
        .and_then(|origin| HeaderValue::from_str(&origin).ok());

    match origin {
        Some(origin) => cors.allow_origin(origin),
        None => {
            tracing::warn!(frontend_url, "Frontend URL has no usable origin, CORS disabled");
            cors
        }
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
