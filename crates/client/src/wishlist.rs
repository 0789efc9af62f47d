//! Wishlist state manager.
//!
//! The local wishlist is only ever replaced by a server response. Every
//! request takes a sequence number when it is issued and its response is
//! applied only if no later-issued response has been applied already, so a
//! slow response can never overwrite a newer one.
//!
//! The cache is also tagged with the session generation it was fetched
//! under. Once that session ends, by logout or by a 401, the cache reads as
//! `None` even before [`WishlistManager::reset`] runs.

use std::sync::{PoisonError, RwLock};

use reqwest::Method;
use uuid::Uuid;

use stes_core::ProductId;
use stes_core::wishlist::{AddItemRequest, ToggleOutcome, Wishlist, WishlistSettings};

use crate::error::{ClientError, Result};
use crate::http::ApiClient;

#[derive(Debug, Default)]
struct WishlistState {
    wishlist: Option<Wishlist>,
    /// Last sequence number handed out.
    issued: u64,
    /// Sequence number of the response currently in `wishlist`.
    applied: u64,
    /// Session generation `wishlist` was fetched under.
    generation: Option<u64>,
}

impl WishlistState {
    const fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Store `wishlist` unless a newer response got there first.
    fn apply(&mut self, seq: u64, generation: Option<u64>, wishlist: Option<Wishlist>) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.wishlist = wishlist;
        self.generation = generation;
        self.applied = seq;
        true
    }

    /// The cached wishlist if it belongs to session `current`.
    fn current(&self, current: Option<u64>) -> Option<&Wishlist> {
        match current {
            Some(_) if current == self.generation => self.wishlist.as_ref(),
            _ => None,
        }
    }
}

/// Caches the signed-in customer's wishlist.
#[derive(Debug)]
pub struct WishlistManager {
    api: ApiClient,
    state: RwLock<WishlistState>,
}

impl WishlistManager {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: RwLock::new(WishlistState::default()),
        }
    }

    /// The cached wishlist of the current session.
    #[must_use]
    pub fn wishlist(&self) -> Option<Wishlist> {
        self.read_current(|w| w.cloned())
    }

    /// Whether `product_id` is in the cached wishlist. No request is made.
    #[must_use]
    pub fn is_in_wishlist(&self, product_id: ProductId) -> bool {
        self.read_current(|w| w.is_some_and(|w| w.contains(product_id)))
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.read_current(|w| w.map_or(0, Wishlist::len))
    }

    /// Drop the cached wishlist, e.g. after logout.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let seq = state.issue();
        state.apply(seq, None, None);
    }

    fn read_current<T>(&self, f: impl FnOnce(Option<&Wishlist>) -> T) -> T {
        let current = self.api.session_generation();
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(state.current(current))
    }

    fn issue(&self) -> u64 {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .issue()
    }

    fn apply(&self, seq: u64, generation: Option<u64>, wishlist: Option<Wishlist>) {
        let applied = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(seq, generation, wishlist);
        if !applied {
            tracing::debug!(seq, "Discarded stale wishlist response");
        }
    }

    // -------------------------------------------------------------------------
    // Server calls
    // -------------------------------------------------------------------------

    /// Fetch the wishlist. Without a session the cache is cleared and
    /// `None` returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn load_wishlist(&self) -> Result<Option<Wishlist>> {
        let seq = self.issue();
        let request = match self.api.authed(Method::GET, "api/wishlist") {
            Ok(request) => request,
            Err(ClientError::NotAuthenticated) => {
                self.apply(seq, None, None);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let generation = request.generation();
        let wishlist: Wishlist = self.api.send_authed(request).await?;
        self.apply(seq, Some(generation), Some(wishlist.clone()));
        Ok(Some(wishlist))
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or an
    /// error if the product is unknown or the request fails.
    pub async fn add_to_wishlist(&self, product_id: ProductId) -> Result<Wishlist> {
        let request = self
            .api
            .authed(Method::POST, "api/wishlist/items")?
            .json(&AddItemRequest { product_id });
        self.replace(request).await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or an
    /// error if the product is not saved or the request fails.
    pub async fn remove_from_wishlist(&self, product_id: ProductId) -> Result<Wishlist> {
        let request = self
            .api
            .authed(Method::DELETE, &format!("api/wishlist/items/{product_id}"))?;
        self.replace(request).await
    }

    /// Add the product if absent, remove it otherwise. Returns whether it
    /// was added.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or an
    /// error if the request fails.
    pub async fn toggle_wishlist(&self, product_id: ProductId) -> Result<bool> {
        let request = self
            .api
            .authed(Method::POST, &format!("api/wishlist/toggle/{product_id}"))?;
        let seq = self.issue();
        let generation = request.generation();
        let outcome: ToggleOutcome = self.api.send_authed(request).await?;
        self.apply(seq, Some(generation), Some(outcome.wishlist));
        Ok(outcome.added)
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or an
    /// error if the request fails.
    pub async fn clear_wishlist(&self) -> Result<Wishlist> {
        let request = self.api.authed(Method::DELETE, "api/wishlist")?;
        self.replace(request).await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or an
    /// error if a field is invalid or the request fails.
    pub async fn update_settings(&self, settings: &WishlistSettings) -> Result<Wishlist> {
        let request = self
            .api
            .authed(Method::PUT, "api/wishlist/settings")?
            .json(settings);
        self.replace(request).await
    }

    /// A public wishlist shared by token. Does not touch the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the wishlist is not found or not public.
    pub async fn shared(&self, share_token: Uuid) -> Result<Wishlist> {
        self.api
            .send(
                self.api
                    .request(Method::GET, &format!("api/wishlist/shared/{share_token}"))?,
            )
            .await
    }

    async fn replace(&self, request: crate::http::AuthedRequest) -> Result<Wishlist> {
        let seq = self.issue();
        let generation = request.generation();
        let wishlist: Wishlist = self.api.send_authed(request).await?;
        self.apply(seq, Some(generation), Some(wishlist.clone()));
        Ok(wishlist)
    }
}
