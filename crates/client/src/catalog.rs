//! Anonymous catalog calls.

use reqwest::Method;
use serde::Serialize;

use stes_core::ProductId;
use stes_core::catalog::{
    CategoryNode, MAX_SUGGESTIONS, MIN_SUGGESTION_CHARS, Product, ProductFilter, ProductPage,
    ProductQuery, ProductSummary,
};

use crate::error::Result;
use crate::http::ApiClient;

#[derive(Debug, Serialize)]
struct LimitQuery {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct SearchQuery<'a> {
    q: &'a str,
    limit: u32,
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    api: ApiClient,
}

impl CatalogClient {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// List products. Blank parameters are dropped before sending so they
    /// behave exactly like missing ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn products(&self, query: &ProductQuery) -> Result<ProductPage> {
        let query = query.clone().stripped();
        self.api
            .send(
                self.api
                    .request_with_query(Method::GET, "api/products", &query)?,
            )
            .await
    }

    /// List products for an already-normalized filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn filtered(&self, filter: &ProductFilter) -> Result<ProductPage> {
        self.products(&filter.to_query()).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn featured(&self, limit: Option<u32>) -> Result<Vec<Product>> {
        self.api
            .send(self.api.request_with_query(
                Method::GET,
                "api/products/featured",
                &LimitQuery { limit },
            )?)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn categories(&self) -> Result<Vec<CategoryNode>> {
        self.api
            .send(self.api.request(Method::GET, "api/products/categories")?)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn brands(&self) -> Result<Vec<String>> {
        self.api
            .send(self.api.request(Method::GET, "api/products/brands")?)
            .await
    }

    /// Search suggestions. Short terms return nothing without a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn search(&self, term: &str, limit: Option<u32>) -> Result<Vec<ProductSummary>> {
        let term = term.trim();
        if term.chars().count() < MIN_SUGGESTION_CHARS {
            return Ok(Vec::new());
        }

        let query = SearchQuery {
            q: term,
            limit: limit.unwrap_or(MAX_SUGGESTIONS).clamp(1, MAX_SUGGESTIONS),
        };
        self.api
            .send(
                self.api
                    .request_with_query(Method::GET, "api/products/search", &query)?,
            )
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the product does not exist or the request fails.
    pub async fn product(&self, id: ProductId) -> Result<Product> {
        self.api
            .send(self.api.request(Method::GET, &format!("api/products/{id}"))?)
            .await
    }
}
