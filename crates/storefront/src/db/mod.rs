//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `stes`
//!
//! ## Tables
//!
//! - `product` - Catalog (seeded by the CLI, mutated by order placement)
//! - `customer` - Accounts with Argon2id password hashes
//! - `address` - Saved shipping addresses, at most one default per customer
//! - `wishlist` / `wishlist_item` - One wishlist per customer, created lazily
//! - `customer_order` / `order_item` / `order_event` - Orders and their status timeline
//! - `notification_preferences` - JSONB preferences document per customer
//! - `push_subscription` - Web Push endpoints, unique by endpoint
//! - `notification` - Notification history
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p stes-cli -- migrate
//! ```

pub mod addresses;
pub mod customers;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod wishlists;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use customers::CustomerRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use wishlists::WishlistRepository;

/// Embedded migrations, applied by `stes-cli migrate`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, everything else to `Database`.
    pub(crate) fn from_unique_violation(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(what.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
