//! Wishlist route handlers.
//!
//! Every mutation returns the whole wishlist so clients replace their local
//! copy instead of patching it.

use axum::{Json, extract::State};
use uuid::Uuid;

use stes_core::ProductId;
use stes_core::api::ApiResponse;
use stes_core::catalog::Product;
use stes_core::wishlist::{AddItemRequest, ToggleOutcome, Wishlist, WishlistCheck, WishlistSettings};

use super::{ApiJson, ApiPath, ok};
use crate::db::{ProductRepository, WishlistRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::state::AppState;

type WishlistResponse = Result<Json<ApiResponse<Wishlist>>>;

/// GET /api/wishlist
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
) -> WishlistResponse {
    Ok(ok(WishlistRepository::new(state.pool())
        .load(current.id)
        .await?))
}

/// DELETE /api/wishlist
pub async fn clear(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
) -> WishlistResponse {
    Ok(ok(WishlistRepository::new(state.pool())
        .clear(current.id)
        .await?))
}

/// PUT /api/wishlist/settings
pub async fn update_settings(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiJson(settings): ApiJson<WishlistSettings>,
) -> WishlistResponse {
    settings.validate().map_err(AppError::Validation)?;

    Ok(ok(WishlistRepository::new(state.pool())
        .update_settings(current.id, &settings)
        .await?))
}

/// Add a product. Adding one that is already saved is not an error.
///
/// POST /api/wishlist/items
pub async fn add_item(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiJson(request): ApiJson<AddItemRequest>,
) -> WishlistResponse {
    let product = active_product(&state, request.product_id).await?;

    let wishlist = WishlistRepository::new(state.pool())
        .add_item(current.id, &product)
        .await?;

    tracing::debug!(customer_id = %current.id, product_id = %product.id, "Wishlist item added");
    Ok(ok(wishlist))
}

/// DELETE /api/wishlist/items/{product_id}
pub async fn remove_item(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiPath(product_id): ApiPath<ProductId>,
) -> WishlistResponse {
    let (wishlist, removed) = WishlistRepository::new(state.pool())
        .remove_item(current.id, product_id)
        .await?;

    if !removed {
        return Err(AppError::NotFound("Product is not in the wishlist".to_owned()));
    }
    Ok(ok(wishlist))
}

/// Remove the product if saved, add it otherwise.
///
/// POST /api/wishlist/toggle/{product_id}
pub async fn toggle(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<ApiResponse<ToggleOutcome>>> {
    let wishlists = WishlistRepository::new(state.pool());

    let (wishlist, removed) = wishlists.remove_item(current.id, product_id).await?;
    if removed {
        return Ok(ok(ToggleOutcome {
            wishlist,
            added: false,
        }));
    }

    let product = active_product(&state, product_id).await?;
    let wishlist = wishlists.add_item(current.id, &product).await?;
    Ok(ok(ToggleOutcome {
        wishlist,
        added: true,
    }))
}

/// GET /api/wishlist/check/{product_id}
pub async fn check(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<ApiResponse<WishlistCheck>>> {
    let in_wishlist = WishlistRepository::new(state.pool())
        .contains(current.id, product_id)
        .await?;
    Ok(ok(WishlistCheck { in_wishlist }))
}

/// A public wishlist by share token.
///
/// GET /api/wishlist/shared/{share_token}
pub async fn shared(
    State(state): State<AppState>,
    ApiPath(share_token): ApiPath<Uuid>,
) -> WishlistResponse {
    WishlistRepository::new(state.pool())
        .shared(share_token)
        .await?
        .map(ok)
        .ok_or_else(|| AppError::NotFound("Wishlist not found".to_owned()))
}

async fn active_product(state: &AppState, id: ProductId) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))
}
