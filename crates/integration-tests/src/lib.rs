//! Black-box tests for the STES.tn storefront.
//!
//! Every test talks to a live server over HTTP, so they are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! # Database, migrations and sample catalog
//! stes-cli migrate
//! stes-cli seed products crates/cli/data/products.yaml
//!
//! # Server
//! cargo run -p stes-storefront
//!
//! # Tests
//! STOREFRONT_BASE_URL=http://localhost:5000 cargo test -p stes-integration-tests -- --ignored
//! ```
//!
//! Registration and login are rate limited per IP, so account tests go
//! through [`throttled`] and a full run takes a while.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use stes_client::{ClientConfig, ClientError, MemoryTokenStore, StesClient};
use stes_core::customer::RegisterRequest;
use uuid::Uuid;

/// Password used for every account these tests create.
pub const TEST_PASSWORD: &str = "Piscine-2024!";

/// Register and login share a per-IP limiter that refills one slot every
/// six seconds.
const THROTTLE_BACKOFF: Duration = Duration::from_secs(6);
const THROTTLE_ATTEMPTS: u32 = 10;

/// Base URL of the storefront under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_owned())
}

/// Full URL for `path` on the server under test.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}/{}", base_url().trim_end_matches('/'), path.trim_start_matches('/'))
}

/// A fresh SDK client with an in-memory token store.
///
/// # Errors
///
/// Returns an error if the base URL is invalid.
pub fn client() -> Result<StesClient, ClientError> {
    StesClient::new(
        ClientConfig::new(&base_url())?,
        Arc::new(MemoryTokenStore::new()),
    )
}

/// A unique address so reruns never collide on the email constraint.
#[must_use]
pub fn unique_email() -> String {
    format!("test-{}@stes.tn", Uuid::new_v4().simple())
}

/// Registration payload for a brand new customer.
#[must_use]
pub fn registration(email: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Test Client".to_owned(),
        email: email.to_owned(),
        password: TEST_PASSWORD.to_owned(),
        phone: None,
    }
}

/// A client signed in as a newly registered customer.
///
/// # Errors
///
/// Returns an error if the server rejects the registration.
pub async fn signed_in_client() -> Result<StesClient, ClientError> {
    let client = client()?;
    let request = registration(&unique_email());
    throttled(|| client.session.register(&request)).await?;
    Ok(client)
}

/// Run a rate-limited call, waiting out `429 Too Many Requests` answers.
///
/// # Errors
///
/// Returns the call's own error, or the last 429 once attempts run out.
pub async fn throttled<T, F, Fut>(mut call: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Err(e) if e.status() == Some(429) && attempt < THROTTLE_ATTEMPTS => {
                attempt += 1;
                tokio::time::sleep(THROTTLE_BACKOFF).await;
            }
            result => return result,
        }
    }
}
