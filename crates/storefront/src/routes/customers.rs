//! Customer account route handlers.
//!
//! Registration and login return `{customer, token}`; every other handler
//! requires a bearer token.

use axum::{Json, extract::State, http::StatusCode};

use stes_core::AddressId;
use stes_core::api::{ApiResponse, FieldError, Validator};
use stes_core::customer::{
    Address, AddressInput, AuthPayload, ChangePasswordRequest, Customer, LoginRequest,
    RegisterRequest, UpdateProfileRequest,
};

use super::{ApiJson, ApiPath, Message, created, ok};
use crate::db::{AddressRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Credentials
// =============================================================================

/// POST /api/customers/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthPayload>>)> {
    request.validate().map_err(AppError::Validation)?;

    let payload = AuthService::new(state.pool(), state.tokens())
        .register(&request)
        .await?;

    Ok(created(payload))
}

/// POST /api/customers/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthPayload>>> {
    Validator::new()
        .check(!request.email.trim().is_empty(), "email", "email is required")
        .check(!request.password.is_empty(), "password", "password is required")
        .finish()
        .map_err(AppError::Validation)?;

    let payload = AuthService::new(state.pool(), state.tokens())
        .login(&request)
        .await
        .inspect_err(|e| tracing::info!(error = %e, "Login rejected"))?;

    tracing::info!(customer_id = %payload.customer.id, "Customer logged in");
    Ok(ok(payload))
}

// =============================================================================
// Profile
// =============================================================================

/// GET /api/customers/me
pub async fn me(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
) -> Result<Json<ApiResponse<Customer>>> {
    let customer = AuthService::new(state.pool(), state.tokens())
        .current(current.id)
        .await?;
    Ok(ok(customer))
}

/// PUT /api/customers/profile
pub async fn update_profile(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<Customer>>> {
    request.validate().map_err(AppError::Validation)?;

    let customer = AuthService::new(state.pool(), state.tokens())
        .update_profile(current.id, &request)
        .await?;
    Ok(ok(customer))
}

/// PUT /api/customers/password
pub async fn change_password(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<Message>>> {
    request.validate().map_err(AppError::Validation)?;

    AuthService::new(state.pool(), state.tokens())
        .change_password(current.id, &request)
        .await
        .map_err(|e| match e {
            // A wrong current password must not log the customer out
            AuthError::InvalidCredentials => AppError::Validation(vec![FieldError::new(
                "currentPassword",
                "current password is incorrect",
            )]),
            other => other.into(),
        })?;

    Ok(ok(Message {
        message: "Password updated",
    }))
}

// =============================================================================
// Addresses
// =============================================================================

/// GET /api/customers/addresses
pub async fn addresses(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
) -> Result<Json<ApiResponse<Vec<Address>>>> {
    Ok(ok(AddressRepository::new(state.pool())
        .list(current.id)
        .await?))
}

/// POST /api/customers/addresses
pub async fn create_address(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiJson(input): ApiJson<AddressInput>,
) -> Result<(StatusCode, Json<ApiResponse<Address>>)> {
    input.validate().map_err(AppError::Validation)?;

    let address = AddressRepository::new(state.pool())
        .create(current.id, &input)
        .await?;
    Ok(created(address))
}

/// PUT /api/customers/addresses/{id}
pub async fn update_address(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiPath(id): ApiPath<AddressId>,
    ApiJson(input): ApiJson<AddressInput>,
) -> Result<Json<ApiResponse<Address>>> {
    input.validate().map_err(AppError::Validation)?;

    let address = AddressRepository::new(state.pool())
        .update(current.id, id, &input)
        .await
        .map_err(address_not_found)?;
    Ok(ok(address))
}

/// DELETE /api/customers/addresses/{id}
pub async fn delete_address(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<Json<ApiResponse<Message>>> {
    AddressRepository::new(state.pool())
        .delete(current.id, id)
        .await
        .map_err(address_not_found)?;
    Ok(ok(Message {
        message: "Address deleted",
    }))
}

/// PUT /api/customers/addresses/{id}/default
pub async fn set_default_address(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiPath(id): ApiPath<AddressId>,
) -> Result<Json<ApiResponse<Address>>> {
    let address = AddressRepository::new(state.pool())
        .set_default(current.id, id)
        .await
        .map_err(address_not_found)?;
    Ok(ok(address))
}

fn address_not_found(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("Address not found".to_owned()),
        other => other.into(),
    }
}
