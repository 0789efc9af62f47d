//! Order route handlers.

use axum::{Json, extract::State, http::StatusCode};

use stes_core::api::ApiResponse;
use stes_core::order::{Order, PlaceOrderRequest, TrackingView};
use stes_core::{OrderId, TrackingCode};

use super::{ApiJson, ApiPath, created, ok};
use crate::db::OrderRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireCustomer;
use crate::services::OrderService;
use crate::state::AppState;

/// POST /api/orders
pub async fn place(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiJson(request): ApiJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>)> {
    let order = OrderService::new(state.pool())
        .place(current.id, request)
        .await?;

    add_breadcrumb(
        "order",
        "Placed order",
        Some(&[("tracking_code", order.tracking_code.as_str())]),
    );
    Ok(created(order))
}

/// The caller's orders, newest first.
///
/// GET /api/orders/my
pub async fn mine(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
) -> Result<Json<ApiResponse<Vec<Order>>>> {
    Ok(ok(OrderRepository::new(state.pool())
        .list_for_customer(current.id)
        .await?))
}

/// An order owned by the caller. Other customers' orders are not found.
///
/// GET /api/orders/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<ApiResponse<Order>>> {
    OrderRepository::new(state.pool())
        .get_for_customer(current.id, id)
        .await?
        .map(ok)
        .ok_or_else(order_not_found)
}

/// Public, case-insensitive tracking lookup.
///
/// GET /api/orders/track/{tracking_code}
pub async fn track(
    State(state): State<AppState>,
    ApiPath(raw): ApiPath<String>,
) -> Result<Json<ApiResponse<TrackingView>>> {
    // A malformed code cannot match any order
    let code = TrackingCode::parse(&raw).map_err(|_| order_not_found())?;

    OrderRepository::new(state.pool())
        .get_by_tracking_code(&code)
        .await?
        .map(|order| ok(TrackingView::from(&order)))
        .ok_or_else(order_not_found)
}

fn order_not_found() -> AppError {
    AppError::NotFound("Order not found".to_owned())
}
