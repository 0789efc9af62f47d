#![allow(clippy::unwrap_used)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use stes_client::{
    ClientConfig, ClientError, MemoryTokenStore, Permission, PushError, PushPlatform, PushState,
    StesClient,
};
use stes_core::notification::{PushKeys, PushSubscription};

use common::VALID_TOKEN;

const ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send/device-1";

/// Scripted browser: the permission prompt always answers `prompt_answer`.
struct FakePlatform {
    supported: bool,
    permission: Mutex<Permission>,
    prompt_answer: Permission,
    prompts: AtomicUsize,
    subscription: Mutex<Option<PushSubscription>>,
}

impl FakePlatform {
    fn new(prompt_answer: Permission) -> Self {
        Self {
            supported: true,
            permission: Mutex::new(Permission::Default),
            prompt_answer,
            prompts: AtomicUsize::new(0),
            subscription: Mutex::new(None),
        }
    }

    fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(Permission::Granted)
        }
    }

    fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl PushPlatform for &FakePlatform {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> Permission {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.permission.lock().unwrap() = self.prompt_answer;
        self.prompt_answer
    }

    async fn register_service_worker(&self) -> Result<(), PushError> {
        Ok(())
    }

    async fn subscribe(&self, vapid_public_key: &str) -> Result<PushSubscription, PushError> {
        assert_eq!(vapid_public_key, "BPublicKeyForTests");
        let subscription = PushSubscription {
            endpoint: ENDPOINT.to_owned(),
            keys: PushKeys {
                p256dh: "p256dh-key".to_owned(),
                auth: "auth-secret".to_owned(),
            },
            expiration_time: None,
        };
        *self.subscription.lock().unwrap() = Some(subscription.clone());
        Ok(subscription)
    }

    async fn current_subscription(&self) -> Result<Option<PushSubscription>, PushError> {
        Ok(self.subscription.lock().unwrap().clone())
    }

    async fn unsubscribe(&self) -> Result<Option<String>, PushError> {
        Ok(self
            .subscription
            .lock()
            .unwrap()
            .take()
            .map(|s| s.endpoint))
    }
}

fn signed_in(base_url: &str) -> StesClient {
    StesClient::new(
        ClientConfig::new(base_url).unwrap(),
        Arc::new(MemoryTokenStore::with_token(VALID_TOKEN)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_subscribe_and_unsubscribe() {
    let api = common::spawn().await;
    let client = signed_in(&api.base_url);
    let platform = FakePlatform::new(Permission::Granted);
    let bridge = client.notifications(&platform);

    assert_eq!(bridge.initialize().await.unwrap(), PushState::Unsubscribed);

    let state = bridge.subscribe().await.unwrap();
    assert_eq!(
        state,
        PushState::Subscribed {
            endpoint: ENDPOINT.to_owned()
        }
    );
    assert_eq!(*api.state.subscriptions.lock().unwrap(), vec![ENDPOINT.to_owned()]);

    assert_eq!(bridge.toggle().await.unwrap(), PushState::Unsubscribed);
    assert!(api.state.subscriptions.lock().unwrap().is_empty());
    assert_eq!(api.state.hits("unsubscribe"), 1);
}

#[tokio::test]
async fn test_denied_permission_registers_nothing() {
    let api = common::spawn().await;
    let client = signed_in(&api.base_url);
    let platform = FakePlatform::new(Permission::Denied);
    let bridge = client.notifications(&platform);
    bridge.initialize().await.unwrap();

    let err = bridge.toggle().await.unwrap_err();
    assert!(matches!(err, ClientError::Push(PushError::PermissionDenied)));
    assert!(bridge.is_denied());
    assert_eq!(bridge.state(), PushState::Unsubscribed);

    // Denied is terminal: no second prompt, still nothing on the server
    let err = bridge.subscribe().await.unwrap_err();
    assert!(matches!(err, ClientError::Push(PushError::PermissionDenied)));
    assert_eq!(platform.prompts(), 1);
    assert_eq!(api.state.hits("subscribe"), 0);
}

#[tokio::test]
async fn test_dismissed_prompt_can_be_retried() {
    let api = common::spawn().await;
    let client = signed_in(&api.base_url);
    let platform = FakePlatform::new(Permission::Default);
    let bridge = client.notifications(&platform);

    let err = bridge.subscribe().await.unwrap_err();
    assert!(matches!(err, ClientError::Push(PushError::PermissionDismissed)));
    assert!(!bridge.is_denied());

    bridge.subscribe().await.unwrap_err();
    assert_eq!(platform.prompts(), 2);
    assert_eq!(api.state.hits("subscribe"), 0);
}

#[tokio::test]
async fn test_missing_vapid_key() {
    let api = common::spawn().await;
    api.state.vapid_disabled.store(true, Ordering::SeqCst);
    let client = signed_in(&api.base_url);
    let platform = FakePlatform::new(Permission::Granted);
    let bridge = client.notifications(&platform);

    let err = bridge.subscribe().await.unwrap_err();
    assert!(matches!(err, ClientError::Push(PushError::VapidKeyUnavailable)));
    // The key is fetched before the prompt
    assert_eq!(platform.prompts(), 0);
    assert_eq!(api.state.hits("subscribe"), 0);
}

#[tokio::test]
async fn test_unsupported_platform() {
    let api = common::spawn().await;
    let client = signed_in(&api.base_url);
    let platform = FakePlatform::unsupported();
    let bridge = client.notifications(&platform);

    assert_eq!(bridge.initialize().await.unwrap(), PushState::Unsupported);
    assert!(matches!(
        bridge.subscribe().await,
        Err(ClientError::Push(PushError::Unsupported))
    ));
    assert_eq!(api.state.hits("vapid"), 0);
}

#[tokio::test]
async fn test_subscribe_requires_session() {
    let api = common::spawn().await;
    let client = StesClient::new(
        ClientConfig::new(&api.base_url).unwrap(),
        Arc::new(MemoryTokenStore::new()),
    )
    .unwrap();
    let platform = FakePlatform::new(Permission::Granted);
    let bridge = client.notifications(&platform);

    assert!(matches!(
        bridge.subscribe().await,
        Err(ClientError::NotAuthenticated)
    ));
    assert_eq!(platform.prompts(), 0);
}

#[tokio::test]
async fn test_unsubscribe_after_logout_keeps_device_subscribed() {
    let api = common::spawn().await;
    let client = signed_in(&api.base_url);
    let platform = FakePlatform::new(Permission::Granted);
    let bridge = client.notifications(&platform);
    bridge.subscribe().await.unwrap();

    client.logout();

    assert!(matches!(
        bridge.unsubscribe().await,
        Err(ClientError::NotAuthenticated)
    ));
    // Device and server still agree
    assert!(platform.subscription.lock().unwrap().is_some());
    assert!(bridge.is_subscribed());
    assert_eq!(*api.state.subscriptions.lock().unwrap(), vec![ENDPOINT.to_owned()]);
    assert_eq!(api.state.hits("unsubscribe"), 0);
}

#[tokio::test]
async fn test_initialize_picks_up_existing_subscription() {
    let api = common::spawn().await;
    let client = signed_in(&api.base_url);
    let platform = FakePlatform::new(Permission::Granted);

    // First bridge subscribes, a second one over the same browser sees it
    client.notifications(&platform).subscribe().await.unwrap();
    let bridge = client.notifications(&platform);

    assert!(matches!(
        bridge.initialize().await.unwrap(),
        PushState::Subscribed { .. }
    ));
    assert!(bridge.is_subscribed());
}
