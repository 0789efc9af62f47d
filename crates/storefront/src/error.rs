//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as the JSON
//! error envelope `{"success": false, "message": ..., "errors": [...]}`;
//! server errors are captured to Sentry before responding and never leak
//! their details.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use stes_core::api::{ApiErrorBody, FieldError};

use crate::db::RepositoryError;
use crate::services::{AuthError, NotificationError, OrderError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Field-level validation failed.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Order placement or status change failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing, invalid or expired bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// A required integration is not configured.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials
                | AuthError::InvalidToken
                | AuthError::CustomerNotFound => StatusCode::UNAUTHORIZED,
                AuthError::CustomerAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::Signing(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Order(err) => match err {
                OrderError::Validation(_)
                | OrderError::UnknownProducts(_)
                | OrderError::AddressNotFound => StatusCode::BAD_REQUEST,
                OrderError::InsufficientStock { .. } | OrderError::InvalidTransition(_) => {
                    StatusCode::CONFLICT
                }
                OrderError::CustomerNotFound => StatusCode::UNAUTHORIZED,
                OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::TrackingCodeExhausted | OrderError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Notification(err) => match err {
                NotificationError::Validation(_) | NotificationError::PushDisabled => {
                    StatusCode::BAD_REQUEST
                }
                NotificationError::SubscriptionNotFound => StatusCode::NOT_FOUND,
                NotificationError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Server errors get a generic one.
    fn message(&self) -> String {
        if self.status().is_server_error() {
            return "Internal server error".to_owned();
        }

        match self {
            Self::Validation(_)
            | Self::Order(OrderError::Validation(_))
            | Self::Notification(NotificationError::Validation(_)) => {
                "Validation failed".to_owned()
            }
            Self::Database(RepositoryError::NotFound) => "Not found".to_owned(),
            Self::Database(RepositoryError::Conflict(what)) => what.clone(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid email or password".to_owned(),
                AuthError::InvalidToken | AuthError::CustomerNotFound => {
                    "Authentication required".to_owned()
                }
                AuthError::CustomerAlreadyExists => {
                    "An account with this email already exists".to_owned()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_owned(),
                _ => "Authentication error".to_owned(),
            },
            Self::Order(OrderError::CustomerNotFound) => "Authentication required".to_owned(),
            Self::Order(err) => capitalize(&err.to_string()),
            Self::Notification(err) => capitalize(&err.to_string()),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Conflict(msg)
            | Self::BadRequest(msg)
            | Self::ServiceUnavailable(msg) => msg.clone(),
            Self::RateLimited => "Too many requests, please try again later".to_owned(),
            _ => self.to_string(),
        }
    }

    fn into_field_errors(self) -> Vec<FieldError> {
        match self {
            Self::Validation(errors)
            | Self::Order(OrderError::Validation(errors))
            | Self::Notification(NotificationError::Validation(errors)) => errors,
            _ => Vec::new(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if matches!(status, StatusCode::CONFLICT | StatusCode::TOO_MANY_REQUESTS) {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = ApiErrorBody::new(self.message()).with_errors(self.into_field_errors());
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a customer ID.
///
/// Called once a bearer token is verified to associate errors with customers.
pub fn set_sentry_user(customer_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(customer_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for customer actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("order", "Placed order", Some(&[("tracking_code", "STES-7K2QMX9A")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
