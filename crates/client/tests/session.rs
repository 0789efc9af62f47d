#![allow(clippy::unwrap_used)]

mod common;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use stes_client::{
    ClientConfig, ClientError, CustomerSession, MemoryTokenStore, StesClient, TokenStore,
};
use stes_core::customer::RegisterRequest;

use common::{PASSWORD, VALID_TOKEN};

/// Memory store that counts how often it is cleared.
#[derive(Default)]
struct CountingStore {
    inner: MemoryTokenStore,
    clears: AtomicUsize,
}

impl CountingStore {
    fn with_token(token: &str) -> Self {
        Self {
            inner: MemoryTokenStore::with_token(token),
            clears: AtomicUsize::new(0),
        }
    }

    fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl TokenStore for CountingStore {
    fn load(&self) -> io::Result<Option<String>> {
        self.inner.load()
    }

    fn save(&self, token: &str) -> io::Result<()> {
        self.inner.save(token)
    }

    fn clear(&self) -> io::Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }
}

fn client(base_url: &str, store: Arc<dyn TokenStore>) -> StesClient {
    StesClient::new(ClientConfig::new(base_url).unwrap(), store).unwrap()
}

fn session(base_url: &str, store: Arc<dyn TokenStore>) -> CustomerSession {
    client(base_url, store).session
}

#[tokio::test]
async fn test_login_persists_token() {
    let api = common::spawn().await;
    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&api.base_url, store.clone());

    let customer = session.login("amira@stes.tn", PASSWORD).await.unwrap();

    assert_eq!(customer.email.as_str(), "amira@stes.tn");
    assert!(session.is_authenticated());
    assert_eq!(session.customer().unwrap().id, customer.id);
    assert_eq!(store.load().unwrap().as_deref(), Some(VALID_TOKEN));

    // The bearer header is attached from now on
    assert_eq!(session.me().await.unwrap().id, customer.id);
}

#[tokio::test]
async fn test_wrong_password_stores_nothing() {
    let api = common::spawn().await;
    let store = Arc::new(CountingStore::default());
    let session = session(&api.base_url, store.clone());

    let err = session
        .login("amira@stes.tn", "wrong-password")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Api { status: 401, ref message, .. } if message == "Invalid email or password"
    ));
    assert!(!session.is_authenticated());
    assert_eq!(store.load().unwrap(), None);
    // A rejected login is not a logout
    assert_eq!(store.clears(), 0);
}

#[tokio::test]
async fn test_register_conflict_stores_nothing() {
    let api = common::spawn().await;
    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&api.base_url, store.clone());

    let request = RegisterRequest {
        name: "Amira".to_owned(),
        email: "taken@stes.tn".to_owned(),
        password: PASSWORD.to_owned(),
        phone: None,
    };
    let err = session.register(&request).await.unwrap_err();

    assert_eq!(err.status(), Some(409));
    assert!(!session.is_authenticated());
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_register_signs_in() {
    let api = common::spawn().await;
    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&api.base_url, store.clone());

    let request = RegisterRequest {
        name: "Amira".to_owned(),
        email: "amira@stes.tn".to_owned(),
        password: PASSWORD.to_owned(),
        phone: Some("+216 20 123 456".to_owned()),
    };
    session.register(&request).await.unwrap();

    assert!(session.is_authenticated());
    assert_eq!(store.load().unwrap().as_deref(), Some(VALID_TOKEN));
}

#[tokio::test]
async fn test_logout_twice_same_as_once() {
    let api = common::spawn().await;
    let store = Arc::new(MemoryTokenStore::new());
    let session = session(&api.base_url, store.clone());
    session.login("amira@stes.tn", PASSWORD).await.unwrap();

    session.logout();
    let after_once = (session.is_authenticated(), session.customer(), store.load().unwrap());

    session.logout();
    let after_twice = (session.is_authenticated(), session.customer(), store.load().unwrap());

    assert_eq!(after_once, (false, None, None));
    assert_eq!(after_once, after_twice);
    assert!(matches!(session.me().await, Err(ClientError::NotAuthenticated)));
}

#[tokio::test]
async fn test_concurrent_401s_log_out_once() {
    let api = common::spawn().await;
    api.state.me_delay_ms.store(100, Ordering::SeqCst);

    let store = Arc::new(CountingStore::with_token("stale-token"));
    let session = session(&api.base_url, store.clone());
    assert!(session.is_authenticated());

    let (first, second) = tokio::join!(session.me(), session.me());

    assert!(first.unwrap_err().is_unauthorized());
    assert!(second.unwrap_err().is_unauthorized());
    assert_eq!(api.state.hits("me"), 2);
    assert_eq!(store.clears(), 1);
    assert!(!session.is_authenticated());
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_stale_401_does_not_drop_new_session() {
    let api = common::spawn().await;
    api.state.me_delay_ms.store(150, Ordering::SeqCst);

    let store = Arc::new(CountingStore::with_token("stale-token"));
    let session = session(&api.base_url, store.clone());

    // The stale request is in flight while the customer logs in again
    let (stale, fresh) = tokio::join!(session.me(), async {
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        session.login("amira@stes.tn", PASSWORD).await
    });

    assert!(stale.unwrap_err().is_unauthorized());
    fresh.unwrap();
    assert!(session.is_authenticated());
    assert_eq!(store.load().unwrap().as_deref(), Some(VALID_TOKEN));
    assert_eq!(store.clears(), 0);
}

#[tokio::test]
async fn test_check_auth_status() {
    let api = common::spawn().await;

    let valid = session(&api.base_url, Arc::new(MemoryTokenStore::with_token(VALID_TOKEN)));
    assert!(valid.check_auth_status().await.unwrap());
    assert!(valid.customer().is_some());

    let store = Arc::new(MemoryTokenStore::with_token("expired-token"));
    let expired = session(&api.base_url, store.clone());
    assert!(!expired.check_auth_status().await.unwrap());
    assert!(!expired.is_authenticated());
    assert_eq!(store.load().unwrap(), None);

    let anonymous = session(&api.base_url, Arc::new(MemoryTokenStore::new()));
    assert!(!anonymous.check_auth_status().await.unwrap());
    assert_eq!(api.state.hits("me"), 2);
}

#[tokio::test]
async fn test_network_failure_keeps_token() {
    // Reserve a port, then close it so connections are refused
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = Arc::new(MemoryTokenStore::with_token(VALID_TOKEN));
    let session = session(&format!("http://{addr}"), store.clone());

    let err = session.check_auth_status().await.unwrap_err();
    assert!(matches!(err, ClientError::Http(_)));
    assert!(session.is_authenticated());
    assert_eq!(store.load().unwrap().as_deref(), Some(VALID_TOKEN));
}

#[tokio::test]
async fn test_file_store_resumes_session() {
    let api = common::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token");

    let first = session(&api.base_url, Arc::new(stes_client::FileTokenStore::new(&path)));
    first.login("amira@stes.tn", PASSWORD).await.unwrap();

    let resumed = session(&api.base_url, Arc::new(stes_client::FileTokenStore::new(&path)));
    assert!(resumed.check_auth_status().await.unwrap());
}
