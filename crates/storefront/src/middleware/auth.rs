//! Bearer token extractors.
//!
//! Customer-scoped handlers take [`RequireCustomer`]. Every other route is
//! public and never looks at the header.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use stes_core::CustomerId;

use crate::error::{AppError, set_sentry_user};
use crate::services::Claims;
use crate::state::AppState;

/// The verified identity behind a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentCustomer {
    pub id: CustomerId,
    pub email: String,
}

impl From<Claims> for CurrentCustomer {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.customer_id(),
            email: claims.email,
        }
    }
}

/// Extractor that requires a valid bearer token.
///
/// Rejects with a 401 JSON envelope when the header is missing or the token
/// is malformed, forged or expired.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireCustomer(customer): RequireCustomer) -> impl IntoResponse {
///     format!("Bonjour, {}!", customer.email)
/// }
/// ```
pub struct RequireCustomer(pub CurrentCustomer);

impl FromRequestParts<AppState> for RequireCustomer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_owned()))?;

        let claims = state
            .tokens()
            .verify(token)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_owned()))?;

        let customer = CurrentCustomer::from(claims);
        tracing::Span::current().record("customer_id", customer.id.as_i32());
        set_sentry_user(&customer.id, Some(&customer.email));

        Ok(Self(customer))
    }
}

/// The token of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
