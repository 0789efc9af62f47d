//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Password registration/login, bearer tokens, password changes
//! - `orders` - Order placement in one transaction, status transitions
//! - `notifications` - Preferences, push subscriptions, history, test sends
//!
//! Catalog, address and wishlist handlers talk to their repositories
//! directly; they have no rules beyond what the repository enforces.

pub mod auth;
pub mod notifications;
pub mod orders;

pub use auth::{AuthError, AuthService, Claims, TokenKeys};
pub use notifications::{NotificationError, NotificationService};
pub use orders::{OrderError, OrderService};
