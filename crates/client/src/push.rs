//! Push notification bridge.
//!
//! The host UI implements [`PushPlatform`] over its service worker,
//! permission prompt and push manager. [`NotificationBridge`] drives it
//! through `Unsupported -> Unsubscribed -> Subscribed` and keeps the server
//! in step. A denied permission is terminal for the bridge: it is never
//! prompted again and nothing is registered server-side.

use std::future::Future;
use std::sync::{PoisonError, RwLock};

use reqwest::Method;
use serde::Serialize;
use serde::de::IgnoredAny;

use stes_core::notification::{
    NotificationHistory, NotificationPreferences, NotificationStats, PushSubscription,
    SubscribeRequest, TestNotificationOutcome, UnsubscribeRequest, VapidPublicKey,
};

use crate::error::{ClientError, PushError, Result};
use crate::http::ApiClient;

/// Result of a notification permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Not asked yet, or the prompt was dismissed.
    Default,
    Granted,
    Denied,
}

/// Browser-side push capabilities, provided by the UI host.
pub trait PushPlatform: Send + Sync {
    /// Whether service workers and the push manager exist at all.
    fn is_supported(&self) -> bool;

    /// Current permission without prompting.
    fn permission(&self) -> Permission;

    fn request_permission(&self) -> impl Future<Output = Permission> + Send;

    fn register_service_worker(&self) -> impl Future<Output = Result<(), PushError>> + Send;

    /// Subscribe the push manager with the server's application key.
    fn subscribe(
        &self,
        vapid_public_key: &str,
    ) -> impl Future<Output = Result<PushSubscription, PushError>> + Send;

    /// The existing push manager subscription, if any.
    fn current_subscription(
        &self,
    ) -> impl Future<Output = Result<Option<PushSubscription>, PushError>> + Send;

    /// Drop the push manager subscription. Returns the endpoint that was
    /// removed.
    fn unsubscribe(&self) -> impl Future<Output = Result<Option<String>, PushError>> + Send;

    /// User agent reported to the server with a new subscription.
    fn user_agent(&self) -> Option<String> {
        None
    }
}

/// Where the bridge is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushState {
    Unsupported,
    Unsubscribed,
    Subscribed { endpoint: String },
}

#[derive(Debug)]
struct BridgeState {
    status: PushState,
    denied: bool,
}

#[derive(Debug, Serialize)]
struct HistoryQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

/// Keeps the platform subscription and the server registration in step.
#[derive(Debug)]
pub struct NotificationBridge<P> {
    api: ApiClient,
    platform: P,
    state: RwLock<BridgeState>,
}

impl<P: PushPlatform> NotificationBridge<P> {
    /// Create a bridge. Call [`Self::initialize`] before subscribing.
    pub fn new(api: ApiClient, platform: P) -> Self {
        let status = if platform.is_supported() {
            PushState::Unsubscribed
        } else {
            PushState::Unsupported
        };
        let denied = platform.permission() == Permission::Denied;

        Self {
            api,
            platform,
            state: RwLock::new(BridgeState { status, denied }),
        }
    }

    #[must_use]
    pub fn state(&self) -> PushState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
            .clone()
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        matches!(self.state(), PushState::Subscribed { .. })
    }

    /// Whether permission was denied during this session.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .denied
    }

    fn set_status(&self, status: PushState) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .status = status;
    }

    fn mark_denied(&self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .denied = true;
    }

    /// Pick up a subscription the platform already holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot be queried.
    pub async fn initialize(&self) -> Result<PushState> {
        if !self.platform.is_supported() {
            self.set_status(PushState::Unsupported);
            return Ok(PushState::Unsupported);
        }

        let status = match self.platform.current_subscription().await? {
            Some(subscription) => PushState::Subscribed {
                endpoint: subscription.endpoint,
            },
            None => PushState::Unsubscribed,
        };
        self.set_status(status.clone());
        Ok(status)
    }

    /// Subscribe this device and register it with the server.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::PermissionDenied`] once permission has been
    /// denied, [`PushError::Unsupported`] on platforms without push,
    /// [`PushError::VapidKeyUnavailable`] when the server has no key, and
    /// [`ClientError::NotAuthenticated`] without a session.
    pub async fn subscribe(&self) -> Result<PushState> {
        if !self.api.is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }

        match self.state() {
            PushState::Unsupported => return Err(PushError::Unsupported.into()),
            subscribed @ PushState::Subscribed { .. } => return Ok(subscribed),
            PushState::Unsubscribed => {}
        }

        if self.is_denied() {
            return Err(PushError::PermissionDenied.into());
        }

        self.platform.register_service_worker().await?;
        let vapid = self.vapid_public_key().await?;

        let permission = match self.platform.permission() {
            Permission::Granted => Permission::Granted,
            _ => self.platform.request_permission().await,
        };
        match permission {
            Permission::Granted => {}
            Permission::Denied => {
                self.mark_denied();
                tracing::info!("Push permission denied");
                return Err(PushError::PermissionDenied.into());
            }
            Permission::Default => return Err(PushError::PermissionDismissed.into()),
        }

        let subscription = self.platform.subscribe(&vapid.public_key).await?;
        let endpoint = subscription.endpoint.clone();

        let request = SubscribeRequest {
            subscription,
            user_agent: self.platform.user_agent(),
        };
        let registered: Result<IgnoredAny> = self
            .api
            .send_authed(
                self.api
                    .authed(Method::POST, "api/notifications/subscribe")?
                    .json(&request),
            )
            .await;

        if let Err(e) = registered {
            // Do not leave a platform subscription the server never saw
            if let Err(rollback) = self.platform.unsubscribe().await {
                tracing::warn!(error = %rollback, "Failed to roll back push subscription");
            }
            return Err(e);
        }

        tracing::info!("Push notifications enabled");
        let status = PushState::Subscribed { endpoint };
        self.set_status(status.clone());
        Ok(status)
    }

    /// Unsubscribe this device and tell the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, leaving
    /// the device subscribed. Otherwise returns an error if the platform or
    /// the server call fails. An endpoint the server no longer knows is not
    /// an error.
    pub async fn unsubscribe(&self) -> Result<PushState> {
        if self.state() == PushState::Unsupported {
            return Err(PushError::Unsupported.into());
        }
        let request = self
            .api
            .authed(Method::POST, "api/notifications/unsubscribe")?;

        let Some(endpoint) = self.platform.unsubscribe().await? else {
            self.set_status(PushState::Unsubscribed);
            return Ok(PushState::Unsubscribed);
        };
        self.set_status(PushState::Unsubscribed);

        let removed: Result<IgnoredAny> = self
            .api
            .send_authed(request.json(&UnsubscribeRequest { endpoint }))
            .await;

        match removed {
            Ok(_) => {}
            Err(e) if e.status() == Some(404) => {
                tracing::debug!("Server had no record of the push subscription");
            }
            Err(e) => return Err(e),
        }

        tracing::info!("Push notifications disabled");
        Ok(PushState::Unsubscribed)
    }

    /// Subscribe when unsubscribed and the other way round.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`] and [`Self::unsubscribe`].
    pub async fn toggle(&self) -> Result<PushState> {
        if self.is_subscribed() {
            self.unsubscribe().await
        } else {
            self.subscribe().await
        }
    }

    // -------------------------------------------------------------------------
    // Plain calls, independent of subscription state
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns [`PushError::VapidKeyUnavailable`] when the server has no key.
    pub async fn vapid_public_key(&self) -> Result<VapidPublicKey> {
        self.api
            .send(
                self.api
                    .request(Method::GET, "api/notifications/vapid-public-key")?,
            )
            .await
            .map_err(|e| match e.status() {
                Some(503) => PushError::VapidKeyUnavailable.into(),
                _ => e,
            })
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn preferences(&self) -> Result<NotificationPreferences> {
        self.api
            .send_authed(self.api.authed(Method::GET, "api/notifications/preferences")?)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> Result<NotificationPreferences> {
        self.api
            .send_authed(
                self.api
                    .authed(Method::PUT, "api/notifications/preferences")?
                    .json(preferences),
            )
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn history(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<NotificationHistory> {
        self.api
            .send_authed(self.api.authed_with_query(
                Method::GET,
                "api/notifications/history",
                &HistoryQuery { page, limit },
            )?)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn stats(&self) -> Result<NotificationStats> {
        self.api
            .send_authed(self.api.authed(Method::GET, "api/notifications/stats")?)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if push is disabled in preferences or the request
    /// fails.
    pub async fn send_test(&self) -> Result<TestNotificationOutcome> {
        self.api
            .send_authed(self.api.authed(Method::POST, "api/notifications/test")?)
            .await
    }
}
