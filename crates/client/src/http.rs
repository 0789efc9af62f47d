//! HTTP transport shared by every client component.
//!
//! All responses flow through [`ApiClient::read`]. Customer-scoped requests
//! carry the token generation they were sent with; a 401 only invalidates
//! the session if that generation is still current, so concurrent 401s for
//! the same stale token clear state exactly once.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use stes_core::api::{ApiErrorBody, ApiResponse};
use stes_core::customer::Customer;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::token::TokenStore;

// =============================================================================
// Session state
// =============================================================================

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    customer: Option<Customer>,
    /// Bumped every time the token changes.
    generation: u64,
}

/// A customer-scoped request ready to send, tagged with the token
/// generation it authenticates as.
#[derive(Debug)]
pub(crate) struct AuthedRequest {
    builder: RequestBuilder,
    generation: u64,
}

impl AuthedRequest {
    pub(crate) fn json<B: Serialize + ?Sized>(self, body: &B) -> Self {
        Self {
            builder: self.builder.json(body),
            generation: self.generation,
        }
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Low-level client for the storefront JSON API.
///
/// Cheap to clone; clones share the connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    config: ClientConfig,
    store: Arc<dyn TokenStore>,
    session: RwLock<SessionState>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client, resuming any token already in `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the store
    /// cannot be read.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("stes-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let token = store.load()?;
        if token.is_some() {
            tracing::debug!("Resuming persisted session token");
        }

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                config,
                store,
                session: RwLock::new(SessionState {
                    token,
                    ..SessionState::default()
                }),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Whether a token is held. Says nothing about its validity.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session().token.is_some()
    }

    /// Generation of the token currently held, `None` when signed out.
    pub(crate) fn session_generation(&self) -> Option<u64> {
        let session = self.session();
        session.token.as_ref().map(|_| session.generation)
    }

    /// The customer from the last login, register or `me` call.
    #[must_use]
    pub fn customer(&self) -> Option<Customer> {
        self.session().customer.clone()
    }

    // -------------------------------------------------------------------------
    // Session bookkeeping
    // -------------------------------------------------------------------------

    fn session(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn session_mut(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Adopt a freshly issued token. The token is persisted before it is used.
    pub(crate) fn start_session(&self, token: &str, customer: Customer) -> Result<()> {
        self.inner.store.save(token)?;

        let mut session = self.session_mut();
        session.token = Some(token.to_owned());
        session.customer = Some(customer);
        session.generation += 1;
        Ok(())
    }

    pub(crate) fn set_customer(&self, customer: Customer) {
        self.session_mut().customer = Some(customer);
    }

    /// Drop the session. Returns `false` if there was none.
    pub(crate) fn end_session(&self) -> bool {
        let had_token = {
            let mut session = self.session_mut();
            let had_token = session.token.take().is_some();
            session.customer = None;
            if had_token {
                session.generation += 1;
            }
            had_token
        };

        if let Err(e) = self.inner.store.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted token");
        }
        had_token
    }

    /// Drop the session only if it is still the one that received a 401.
    fn invalidate(&self, generation: u64) -> bool {
        {
            let mut session = self.session_mut();
            if session.generation != generation || session.token.is_none() {
                return false;
            }
            session.token = None;
            session.customer = None;
            session.generation += 1;
        }

        if let Err(e) = self.inner.store.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted token");
        }
        tracing::info!("Session rejected by the server, logged out");
        true
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    /// Build an anonymous request.
    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.inner.config.endpoint(path)?;
        Ok(self.inner.client.request(method, url))
    }

    /// Build an anonymous request with query parameters taken from `query`.
    pub(crate) fn request_with_query<Q: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &Q,
    ) -> Result<RequestBuilder> {
        let mut url = self.inner.config.endpoint(path)?;
        append_query(&mut url, query)?;
        Ok(self.inner.client.request(method, url))
    }

    /// Build a bearer-authenticated request. Fails fast without a session.
    pub(crate) fn authed(&self, method: Method, path: &str) -> Result<AuthedRequest> {
        let builder = self.request(method, path)?;
        self.authorize(builder)
    }

    pub(crate) fn authed_with_query<Q: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &Q,
    ) -> Result<AuthedRequest> {
        let builder = self.request_with_query(method, path, query)?;
        self.authorize(builder)
    }

    fn authorize(&self, builder: RequestBuilder) -> Result<AuthedRequest> {
        let (token, generation) = {
            let session = self.session();
            let token = session.token.clone().ok_or(ClientError::NotAuthenticated)?;
            (token, session.generation)
        };

        Ok(AuthedRequest {
            builder: builder.bearer_auth(token),
            generation,
        })
    }

    /// Send an anonymous request and unwrap the response envelope.
    pub(crate) async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        self.read(response, None).await
    }

    /// Send a customer-scoped request. A 401 logs the session out.
    pub(crate) async fn send_authed<T: DeserializeOwned>(
        &self,
        request: AuthedRequest,
    ) -> Result<T> {
        let response = request.builder.send().await?;
        self.read(response, Some(request.generation)).await
    }

    async fn read<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        generation: Option<u64>,
    ) -> Result<T> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED
            && let Some(generation) = generation
        {
            self.invalidate(generation);
        }

        let body = response.bytes().await?;

        if !status.is_success() {
            let err = api_error(status, &body);
            if status.is_server_error() {
                tracing::error!(status = %status, error = %err, "Storefront API error");
            } else {
                tracing::debug!(status = %status, error = %err, "Storefront API rejected request");
            }
            return Err(err);
        }

        let envelope: ApiResponse<T> = serde_json::from_slice(&body).inspect_err(|e| {
            tracing::error!(
                error = %e,
                body = %String::from_utf8_lossy(&body),
                "Failed to decode storefront response"
            );
        })?;
        Ok(envelope.data)
    }
}

/// Build an API error from an error envelope, falling back to the status
/// reason when the body is not one.
fn api_error(status: StatusCode, body: &[u8]) -> ClientError {
    let (message, errors) = serde_json::from_slice::<ApiErrorBody>(body)
        .ok()
        .filter(|body| !body.message.trim().is_empty())
        .map_or_else(
            || {
                (
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_owned(),
                    Vec::new(),
                )
            },
            |body| (body.message, body.errors),
        );

    ClientError::Api {
        status: status.as_u16(),
        message,
        errors,
    }
}

/// Append the non-null scalar fields of `query` as query parameters.
fn append_query<Q: Serialize>(url: &mut Url, query: &Q) -> Result<()> {
    let serde_json::Value::Object(fields) = serde_json::to_value(query)? else {
        return Ok(());
    };

    let mut pairs = url.query_pairs_mut();
    for (key, value) in fields {
        match value {
            serde_json::Value::String(s) => {
                pairs.append_pair(&key, &s);
            }
            serde_json::Value::Number(n) => {
                pairs.append_pair(&key, &n.to_string());
            }
            serde_json::Value::Bool(b) => {
                pairs.append_pair(&key, if b { "true" } else { "false" });
            }
            _ => {}
        }
    }
    drop(pairs);

    // An empty pair set still leaves a dangling `?`
    if url.query() == Some("") {
        url.set_query(None);
    }
    Ok(())
}
