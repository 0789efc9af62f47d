//! Notification route handlers.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::USER_AGENT},
};
use serde::Deserialize;

use stes_core::api::ApiResponse;
use stes_core::notification::{
    NotificationHistory, NotificationPreferences, NotificationStats, SubscribeRequest,
    TestNotificationOutcome, UnsubscribeRequest, VapidPublicKey,
};

use super::{ApiJson, ApiQuery, Message, created, ok};
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::services::NotificationService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// The VAPID application server key browsers subscribe with.
///
/// GET /api/notifications/vapid-public-key
pub async fn vapid_public_key(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<VapidPublicKey>>> {
    let vapid = state.vapid().ok_or_else(|| {
        AppError::ServiceUnavailable("Push notifications are not configured".to_owned())
    })?;

    Ok(ok(VapidPublicKey {
        public_key: vapid.public_key.clone(),
    }))
}

/// POST /api/notifications/subscribe
pub async fn subscribe(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    headers: HeaderMap,
    ApiJson(request): ApiJson<SubscribeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Message>>)> {
    let user_agent = request.user_agent.as_deref().or_else(|| {
        headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
    });

    NotificationService::new(state.pool())
        .subscribe(current.id, &request.subscription, user_agent)
        .await?;

    Ok(created(Message {
        message: "Subscribed to push notifications",
    }))
}

/// POST /api/notifications/unsubscribe
pub async fn unsubscribe(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiJson(request): ApiJson<UnsubscribeRequest>,
) -> Result<Json<ApiResponse<Message>>> {
    NotificationService::new(state.pool())
        .unsubscribe(current.id, &request.endpoint)
        .await?;

    Ok(ok(Message {
        message: "Unsubscribed from push notifications",
    }))
}

/// Saved preferences, or the defaults.
///
/// GET /api/notifications/preferences
pub async fn preferences(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
) -> Result<Json<ApiResponse<NotificationPreferences>>> {
    Ok(ok(NotificationService::new(state.pool())
        .preferences(current.id)
        .await?))
}

/// Replace the whole preferences document. Quiet-hours times that are not
/// `HH:MM` fail deserialization and are rejected as a bad request.
///
/// PUT /api/notifications/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiJson(preferences): ApiJson<NotificationPreferences>,
) -> Result<Json<ApiResponse<NotificationPreferences>>> {
    Ok(ok(NotificationService::new(state.pool())
        .save_preferences(current.id, &preferences)
        .await?))
}

/// GET /api/notifications/history?page=&limit=
pub async fn history(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<ApiResponse<NotificationHistory>>> {
    Ok(ok(NotificationService::new(state.pool())
        .history(current.id, query.page, query.limit)
        .await?))
}

/// GET /api/notifications/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
) -> Result<Json<ApiResponse<NotificationStats>>> {
    Ok(ok(NotificationService::new(state.pool())
        .stats(current.id)
        .await?))
}

/// POST /api/notifications/test
pub async fn send_test(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
) -> Result<Json<ApiResponse<TestNotificationOutcome>>> {
    Ok(ok(NotificationService::new(state.pool())
        .send_test(current.id)
        .await?))
}
