//! Catalog route handlers.

use axum::{Json, extract::State};
use serde::Deserialize;

use stes_core::ProductId;
use stes_core::api::ApiResponse;
use stes_core::catalog::{
    CategoryNode, MAX_LIMIT, MAX_SUGGESTIONS, MIN_SUGGESTION_CHARS, Pagination, Product,
    ProductFilter, ProductPage, ProductQuery, ProductSummary,
};

use super::{ApiPath, ApiQuery, ok};
use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

const DEFAULT_FEATURED_LIMIT: u32 = 8;

/// `?limit=` for featured products. Kept as a string so garbage is ignored.
#[derive(Debug, Deserialize)]
pub struct FeaturedQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
}

/// Parse an optional numeric limit, falling back to `default` and clamping
/// to `1..=max`.
fn parse_limit(raw: Option<&str>, default: u32, max: u32) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
        .min(max)
}

/// List products.
///
/// GET /api/products
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<ApiResponse<ProductPage>>> {
    let filter = ProductFilter::from_query(&query);
    let (products, total) = ProductRepository::new(state.pool()).list(&filter).await?;

    tracing::debug!(
        total,
        page = filter.page,
        limit = filter.limit,
        "Catalog query"
    );

    Ok(ok(ProductPage {
        products,
        pagination: Pagination::new(filter.page, filter.limit, total),
    }))
}

/// GET /api/products/featured
pub async fn featured(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FeaturedQuery>,
) -> Result<Json<ApiResponse<Vec<Product>>>> {
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_FEATURED_LIMIT, MAX_LIMIT);
    let products = ProductRepository::new(state.pool()).featured(limit).await?;
    Ok(ok(products))
}

/// GET /api/products/categories
pub async fn categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CategoryNode>>>> {
    Ok(ok(ProductRepository::new(state.pool()).categories().await?))
}

/// GET /api/products/brands
pub async fn brands(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<String>>>> {
    Ok(ok(ProductRepository::new(state.pool()).brands().await?))
}

/// Quick search suggestions. Terms shorter than two characters return an
/// empty list without querying.
///
/// GET /api/products/search?q=&limit=
pub async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<ProductSummary>>>> {
    let term = query.q.as_deref().map(str::trim).unwrap_or_default();
    if term.chars().count() < MIN_SUGGESTION_CHARS {
        return Ok(ok(Vec::new()));
    }

    let limit = parse_limit(query.limit.as_deref(), MAX_SUGGESTIONS, MAX_SUGGESTIONS);
    let products = ProductRepository::new(state.pool())
        .suggest(term, limit)
        .await?;

    Ok(ok(products.iter().map(Product::summary).collect()))
}

/// GET /api/products/{id}
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ApiResponse<Product>>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(ok)
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None, 8, 100), 8);
        assert_eq!(parse_limit(Some("abc"), 8, 100), 8);
        assert_eq!(parse_limit(Some("0"), 8, 100), 8);
        assert_eq!(parse_limit(Some("-3"), 8, 100), 8);
        assert_eq!(parse_limit(Some(" 4 "), 8, 100), 4);
        assert_eq!(parse_limit(Some("500"), 10, 10), 10);
    }
}
