//! Wishlist repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use stes_core::catalog::{Product, ProductSummary};
use stes_core::wishlist::{
    DEFAULT_WISHLIST_NAME, ProductSnapshot, Wishlist, WishlistItem, WishlistSettings,
};
use stes_core::{CustomerId, ProductId, WishlistId};

use super::RepositoryError;

const WISHLIST_COLUMNS: &str = "id, name, description, is_public, share_token, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct WishlistRow {
    id: WishlistId,
    name: String,
    description: Option<String>,
    is_public: bool,
    share_token: Uuid,
    updated_at: DateTime<Utc>,
}

impl WishlistRow {
    fn with_items(self, items: Vec<WishlistItem>) -> Wishlist {
        Wishlist {
            id: self.id,
            name: self.name,
            description: self.description,
            is_public: self.is_public,
            share_token: self.share_token,
            items,
            updated_at: self.updated_at,
        }
    }
}

/// An item joined with its product, if the product is still active.
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    product_id: ProductId,
    snapshot_name: String,
    snapshot_price: Decimal,
    snapshot_image: Option<String>,
    added_at: DateTime<Utc>,
    current_name: Option<String>,
    current_price: Option<Decimal>,
    current_images: Option<Vec<String>>,
    current_brand: Option<String>,
    current_rating: Option<f64>,
    current_stock: Option<i32>,
}

impl From<ItemRow> for WishlistItem {
    fn from(row: ItemRow) -> Self {
        let product = match (row.current_name, row.current_price) {
            (Some(name), Some(price)) => Some(ProductSummary {
                id: row.product_id,
                name,
                price,
                image: row.current_images.and_then(|images| images.into_iter().next()),
                brand: row.current_brand,
                rating: row.current_rating.unwrap_or_default(),
                in_stock: row.current_stock.unwrap_or_default() > 0,
            }),
            _ => None,
        };

        Self {
            product_id: row.product_id,
            product,
            snapshot: ProductSnapshot {
                name: row.snapshot_name,
                price: row.snapshot_price,
                image: row.snapshot_image,
            },
            added_at: row.added_at,
        }
    }
}

/// Repository for wishlists. Each customer has exactly one, created on
/// first access.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    /// Create a new wishlist repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the customer's wishlist, creating an empty one if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn load(&self, customer_id: CustomerId) -> Result<Wishlist, RepositoryError> {
        let row = self.ensure(customer_id).await?;
        let items = items(self.pool, row.id).await?;
        Ok(row.with_items(items))
    }

    /// Add a product. Adding an already saved product is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn add_item(
        &self,
        customer_id: CustomerId,
        product: &Product,
    ) -> Result<Wishlist, RepositoryError> {
        let wishlist = self.ensure(customer_id).await?;
        let snapshot = ProductSnapshot::from(product);

        let inserted = sqlx::query(
            r"
            INSERT INTO stes.wishlist_item (
                wishlist_id, product_id, snapshot_name, snapshot_price, snapshot_image
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (wishlist_id, product_id) DO NOTHING
            ",
        )
        .bind(wishlist.id)
        .bind(product.id)
        .bind(&snapshot.name)
        .bind(snapshot.price)
        .bind(&snapshot.image)
        .execute(self.pool)
        .await?;

        if inserted.rows_affected() > 0 {
            touch(self.pool, wishlist.id).await?;
        }
        self.load(customer_id).await
    }

    /// Remove a product. Returns the wishlist and whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn remove_item(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<(Wishlist, bool), RepositoryError> {
        let wishlist = self.ensure(customer_id).await?;

        let removed = sqlx::query(
            "DELETE FROM stes.wishlist_item WHERE wishlist_id = $1 AND product_id = $2",
        )
        .bind(wishlist.id)
        .bind(product_id)
        .execute(self.pool)
        .await?
        .rows_affected()
            > 0;

        if removed {
            touch(self.pool, wishlist.id).await?;
        }
        Ok((self.load(customer_id).await?, removed))
    }

    /// Remove every item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn clear(&self, customer_id: CustomerId) -> Result<Wishlist, RepositoryError> {
        let wishlist = self.ensure(customer_id).await?;

        sqlx::query("DELETE FROM stes.wishlist_item WHERE wishlist_id = $1")
            .bind(wishlist.id)
            .execute(self.pool)
            .await?;
        touch(self.pool, wishlist.id).await?;

        self.load(customer_id).await
    }

    /// Update name, description and visibility. Unset fields are unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn update_settings(
        &self,
        customer_id: CustomerId,
        settings: &WishlistSettings,
    ) -> Result<Wishlist, RepositoryError> {
        let wishlist = self.ensure(customer_id).await?;

        sqlx::query(
            r"
            UPDATE stes.wishlist
            SET name = COALESCE($2, name),
                description = CASE WHEN $3::text IS NULL THEN description
                                   ELSE NULLIF(btrim($3), '') END,
                is_public = COALESCE($4, is_public),
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(wishlist.id)
        .bind(settings.name.as_deref().map(str::trim))
        .bind(settings.description.as_deref())
        .bind(settings.is_public)
        .execute(self.pool)
        .await?;

        self.load(customer_id).await
    }

    /// Whether the product is saved. Does not create a wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn contains(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let found = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM stes.wishlist_item i
                JOIN stes.wishlist w ON w.id = i.wishlist_id
                WHERE w.customer_id = $1 AND i.product_id = $2
            )
            ",
        )
        .bind(customer_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(found)
    }

    /// A public wishlist by share token. Private wishlists are not found.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn shared(&self, share_token: Uuid) -> Result<Option<Wishlist>, RepositoryError> {
        let row: Option<WishlistRow> = sqlx::query_as(&format!(
            "SELECT {WISHLIST_COLUMNS} FROM stes.wishlist WHERE share_token = $1 AND is_public"
        ))
        .bind(share_token)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => {
                let items = items(self.pool, row.id).await?;
                Ok(Some(row.with_items(items)))
            }
            None => Ok(None),
        }
    }

    async fn ensure(&self, customer_id: CustomerId) -> Result<WishlistRow, RepositoryError> {
        if let Some(row) = self.find(customer_id).await? {
            return Ok(row);
        }

        // A concurrent first access may win the insert; both then read the same row.
        sqlx::query(
            r"
            INSERT INTO stes.wishlist (customer_id, name, share_token)
            VALUES ($1, $2, $3)
            ON CONFLICT (customer_id) DO NOTHING
            ",
        )
        .bind(customer_id)
        .bind(DEFAULT_WISHLIST_NAME)
        .bind(Uuid::new_v4())
        .execute(self.pool)
        .await?;

        self.find(customer_id)
            .await?
            .ok_or_else(|| RepositoryError::DataCorruption("wishlist vanished after insert".into()))
    }

    async fn find(&self, customer_id: CustomerId) -> Result<Option<WishlistRow>, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "SELECT {WISHLIST_COLUMNS} FROM stes.wishlist WHERE customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }
}

async fn items(
    executor: impl PgExecutor<'_>,
    wishlist_id: WishlistId,
) -> Result<Vec<WishlistItem>, RepositoryError> {
    let rows: Vec<ItemRow> = sqlx::query_as(
        r"
        SELECT i.product_id, i.snapshot_name, i.snapshot_price, i.snapshot_image, i.added_at,
               p.name AS current_name,
               p.price AS current_price,
               p.images AS current_images,
               p.brand AS current_brand,
               p.rating_average AS current_rating,
               p.stock_quantity AS current_stock
        FROM stes.wishlist_item i
        LEFT JOIN stes.product p ON p.id = i.product_id AND p.is_active
        WHERE i.wishlist_id = $1
        ORDER BY i.added_at DESC, i.product_id
        ",
    )
    .bind(wishlist_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(WishlistItem::from).collect())
}

async fn touch(executor: impl PgExecutor<'_>, wishlist_id: WishlistId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE stes.wishlist SET updated_at = NOW() WHERE id = $1")
        .bind(wishlist_id)
        .execute(executor)
        .await?;
    Ok(())
}
