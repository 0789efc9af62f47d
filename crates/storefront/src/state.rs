//! Shared handler state.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::{StorefrontConfig, VapidConfig};
use crate::services::TokenKeys;

/// Everything a handler needs, behind one `Arc` so cloning per request is a
/// reference-count bump.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Shared>,
}

struct Shared {
    config: StorefrontConfig,
    pool: PgPool,
    tokens: TokenKeys,
}

impl AppState {
    /// Build state from loaded config and an open pool. JWT keys are derived
    /// from the configured secret once, here.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let tokens = TokenKeys::new(&config.jwt_secret, config.token_ttl_hours);
        Self {
            inner: Arc::new(Shared {
                config,
                pool,
                tokens,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenKeys {
        &self.inner.tokens
    }

    /// Push key pair, `None` when the server runs without Web Push.
    #[must_use]
    pub fn vapid(&self) -> Option<&VapidConfig> {
        self.inner.config.vapid.as_ref()
    }
}
