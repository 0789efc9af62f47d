//! STES Client - Async SDK for the STES.tn storefront API.
//!
//! Holds the client-side state a storefront UI needs and keeps it consistent
//! with the server:
//!
//! - [`CustomerSession`] - Token lifecycle, profile and address book
//! - [`WishlistManager`] - Cached wishlist with sequence-guarded updates
//! - [`NotificationBridge`] - Push subscription state machine over a host [`PushPlatform`]
//! - [`Cart`] - Local cart with server-equivalent totals
//! - [`CatalogClient`] / [`OrderClient`] - Stateless catalog and order calls
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stes_client::{ClientConfig, FileTokenStore, StesClient};
//!
//! # async fn run() -> stes_client::Result<()> {
//! let config = ClientConfig::new("https://api.stes.tn")?;
//! let client = StesClient::new(config, Arc::new(FileTokenStore::new(".stes-token")))?;
//!
//! if !client.session.check_auth_status().await? {
//!     client.session.login("client@stes.tn", "mot-de-passe").await?;
//! }
//! client.wishlist.load_wishlist().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod orders;
pub mod push;
pub mod session;
pub mod token;
pub mod wishlist;

use std::sync::Arc;

pub use cart::{Cart, CartError, CartLine, ShipTo};
pub use catalog::CatalogClient;
pub use config::ClientConfig;
pub use error::{ClientError, PushError, Result};
pub use http::ApiClient;
pub use orders::OrderClient;
pub use push::{NotificationBridge, Permission, PushPlatform, PushState};
pub use session::CustomerSession;
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use wishlist::WishlistManager;

/// Every client component over one shared connection and session.
#[derive(Debug)]
pub struct StesClient {
    pub session: CustomerSession,
    pub catalog: CatalogClient,
    pub wishlist: WishlistManager,
    pub orders: OrderClient,
    api: ApiClient,
}

impl StesClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the token
    /// store cannot be read.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let api = ApiClient::new(config, store)?;

        Ok(Self {
            session: CustomerSession::new(api.clone()),
            catalog: CatalogClient::new(api.clone()),
            wishlist: WishlistManager::new(api.clone()),
            orders: OrderClient::new(api.clone()),
            api,
        })
    }

    /// A push bridge over the host's platform, sharing this client's session.
    pub fn notifications<P: PushPlatform>(&self, platform: P) -> NotificationBridge<P> {
        NotificationBridge::new(self.api.clone(), platform)
    }

    /// Log out and drop session-scoped caches.
    pub fn logout(&self) {
        self.session.logout();
        self.wishlist.reset();
    }
}
