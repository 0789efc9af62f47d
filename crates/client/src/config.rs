//! Client configuration.

use std::time::Duration;

use url::Url;

use crate::error::Result;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Where the storefront API lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API origin, always ending in `/` so relative paths join under it.
    pub base_url: Url,
    pub timeout: Duration,
}

impl ClientConfig {
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut url = Url::parse(base_url)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            base_url: url,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve an API path such as `api/products` against the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}
