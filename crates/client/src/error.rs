//! Client error types.

use stes_core::api::FieldError;

/// Errors returned by the storefront client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure: connection refused, timeout, TLS, ...
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        errors: Vec<FieldError>,
    },

    /// A customer-scoped call was made without a session.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Push(#[from] PushError),

    #[error(transparent)]
    Cart(#[from] crate::cart::CartError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The token store could not be read or written.
    #[error("Token storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ClientError {
    /// HTTP status of an API error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the session.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401))
    }

    /// Field-level validation messages, empty for other errors.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Api { errors, .. } => errors,
            _ => &[],
        }
    }
}

/// Push subscription failures, each one actionable by the UI.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("Notification permission was denied; enable it in the browser settings")]
    PermissionDenied,

    #[error("Notification permission prompt was dismissed")]
    PermissionDismissed,

    #[error("Push notifications are not supported on this device")]
    Unsupported,

    #[error("Service worker registration failed: {0}")]
    ServiceWorker(String),

    #[error("Push notifications are not configured on the server")]
    VapidKeyUnavailable,

    #[error("Push platform error: {0}")]
    Platform(String),
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
