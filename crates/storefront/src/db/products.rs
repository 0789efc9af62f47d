//! Product repository.
//!
//! Catalog filters are dynamic, so listing queries are assembled with
//! `QueryBuilder`; every user value goes through `push_bind`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use stes_core::ProductId;
use stes_core::catalog::{CategoryNode, Product, ProductFilter, Rating, build_category_tree};

use super::RepositoryError;

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, description, price, compare_at_price, \
     category, subcategory, brand, stock_quantity, images, rating_average, rating_count, \
     sales_count, is_featured, created_at, updated_at";

/// A `stes.product` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ProductRow {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category: String,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub stock_quantity: i32,
    pub images: Vec<String>,
    pub rating_average: f64,
    pub rating_count: i32,
    pub sales_count: i32,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            compare_at_price: row.compare_at_price,
            category: row.category,
            subcategory: row.subcategory,
            brand: row.brand,
            stock_quantity: row.stock_quantity,
            images: row.images,
            rating: Rating {
                average: row.rating_average,
                count: row.rating_count,
            },
            sales_count: row.sales_count,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Catalog entry written by the seeding command.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category: String,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub stock_quantity: i32,
    pub images: Vec<String>,
    pub rating_average: f64,
    pub rating_count: i32,
    pub is_featured: bool,
    pub is_active: bool,
}

/// Repository for catalog queries.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of active products matching `filter`, plus the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<(Vec<Product>, u64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM stes.product");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM stes.product"));
        push_filters(&mut query, filter);
        let direction = filter.sort_order.sql();
        query.push(format!(
            " ORDER BY {} {direction}, id {direction}",
            filter.sort_by.column()
        ));
        query
            .push(" LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX));

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(self.pool).await?;

        Ok((
            rows.into_iter().map(Product::from).collect(),
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    /// Get an active product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM stes.product WHERE id = $1 AND is_active"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Featured active products, best sellers first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn featured(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM stes.product
             WHERE is_active AND is_featured
             ORDER BY sales_count DESC, id DESC
             LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Category tree with active product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<CategoryNode>, RepositoryError> {
        let rows: Vec<(String, Option<String>, i64)> = sqlx::query_as(
            r"
            SELECT category, subcategory, COUNT(*)
            FROM stes.product
            WHERE is_active
            GROUP BY category, subcategory
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(build_category_tree(rows))
    }

    /// Distinct brands of active products, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn brands(&self) -> Result<Vec<String>, RepositoryError> {
        let brands = sqlx::query_scalar(
            r"
            SELECT DISTINCT brand
            FROM stes.product
            WHERE is_active AND brand IS NOT NULL AND btrim(brand) <> ''
            ORDER BY brand
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(brands)
    }

    /// Quick-search suggestions on name and brand.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn suggest(&self, term: &str, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let pattern = like_pattern(term);
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM stes.product
             WHERE is_active AND (name ILIKE $1 OR brand ILIKE $1)
             ORDER BY sales_count DESC, id DESC
             LIMIT $2"
        ))
        .bind(pattern)
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Insert a product or update the one with the same name
    /// (case-insensitive). Returns the product ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, product: &NewProduct) -> Result<ProductId, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO stes.product (
                name, description, price, compare_at_price, category, subcategory,
                brand, stock_quantity, images, rating_average, rating_count,
                is_featured, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT ((lower(name))) DO UPDATE SET
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                compare_at_price = EXCLUDED.compare_at_price,
                category = EXCLUDED.category,
                subcategory = EXCLUDED.subcategory,
                brand = EXCLUDED.brand,
                stock_quantity = EXCLUDED.stock_quantity,
                images = EXCLUDED.images,
                rating_average = EXCLUDED.rating_average,
                rating_count = EXCLUDED.rating_count,
                is_featured = EXCLUDED.is_featured,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.compare_at_price)
        .bind(&product.category)
        .bind(&product.subcategory)
        .bind(&product.brand)
        .bind(product.stock_quantity)
        .bind(&product.images)
        .bind(product.rating_average)
        .bind(product.rating_count)
        .bind(product.is_featured)
        .bind(product.is_active)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }
}

/// Append the `WHERE` clause for `filter`.
fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    query.push(" WHERE is_active");

    if let Some(category) = &filter.category {
        query
            .push(" AND lower(category) = lower(")
            .push_bind(category.clone())
            .push(")");
    }
    if let Some(subcategory) = &filter.subcategory {
        query
            .push(" AND lower(subcategory) = lower(")
            .push_bind(subcategory.clone())
            .push(")");
    }
    if let Some(brand) = &filter.brand {
        query
            .push(" AND lower(brand) = lower(")
            .push_bind(brand.clone())
            .push(")");
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        query
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR brand ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(min) = filter.min_price {
        query.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        query.push(" AND price <= ").push_bind(max);
    }
    if let Some(rating) = filter.min_rating {
        query.push(" AND rating_average >= ").push_bind(rating);
    }
}

/// `%term%` with `LIKE` wildcards in `term` escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
