#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use stes_client::{ClientConfig, ClientError, MemoryTokenStore, StesClient};
use stes_core::ProductId;
use uuid::Uuid;

use common::{SHARE_TOKEN, VALID_TOKEN};

fn signed_in(base_url: &str) -> StesClient {
    StesClient::new(
        ClientConfig::new(base_url).unwrap(),
        Arc::new(MemoryTokenStore::with_token(VALID_TOKEN)),
    )
    .unwrap()
}

fn anonymous(base_url: &str) -> StesClient {
    StesClient::new(
        ClientConfig::new(base_url).unwrap(),
        Arc::new(MemoryTokenStore::new()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_add_then_remove() {
    let api = common::spawn().await;
    let client = signed_in(&api.base_url);
    let pump = ProductId::new(12);

    client.wishlist.add_to_wishlist(pump).await.unwrap();
    assert!(client.wishlist.is_in_wishlist(pump));
    assert_eq!(client.wishlist.item_count(), 1);

    client.wishlist.remove_from_wishlist(pump).await.unwrap();
    assert!(!client.wishlist.is_in_wishlist(pump));
    assert_eq!(client.wishlist.item_count(), 0);
}

#[tokio::test]
async fn test_toggle_reports_direction() {
    let api = common::spawn().await;
    let client = signed_in(&api.base_url);
    let filter = ProductId::new(5);

    assert!(client.wishlist.toggle_wishlist(filter).await.unwrap());
    assert!(client.wishlist.is_in_wishlist(filter));

    assert!(!client.wishlist.toggle_wishlist(filter).await.unwrap());
    assert!(!client.wishlist.is_in_wishlist(filter));
}

#[tokio::test]
async fn test_mutations_fail_fast_without_session() {
    let api = common::spawn().await;
    let client = anonymous(&api.base_url);

    assert!(matches!(
        client.wishlist.add_to_wishlist(ProductId::new(1)).await,
        Err(ClientError::NotAuthenticated)
    ));
    assert!(matches!(
        client.wishlist.toggle_wishlist(ProductId::new(1)).await,
        Err(ClientError::NotAuthenticated)
    ));
    assert!(matches!(
        client.wishlist.clear_wishlist().await,
        Err(ClientError::NotAuthenticated)
    ));
    assert_eq!(api.state.hits("add_item"), 0);
}

#[tokio::test]
async fn test_load_without_session_is_none() {
    let api = common::spawn().await;
    let client = anonymous(&api.base_url);

    assert!(client.wishlist.load_wishlist().await.unwrap().is_none());
    assert!(client.wishlist.wishlist().is_none());
    assert_eq!(api.state.hits("wishlist"), 0);
}

#[tokio::test]
async fn test_stale_load_is_discarded() {
    let api = common::spawn().await;
    api.state.wishlist_delay_ms.store(200, Ordering::SeqCst);
    let client = signed_in(&api.base_url);
    let pump = ProductId::new(12);

    // The slow load snapshots an empty wishlist, the add lands first
    let (loaded, added) = tokio::join!(client.wishlist.load_wishlist(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.wishlist.add_to_wishlist(pump).await
    });

    assert!(loaded.unwrap().unwrap().is_empty());
    assert!(added.unwrap().contains(pump));
    assert!(client.wishlist.is_in_wishlist(pump));
}

#[tokio::test]
async fn test_logout_drops_cached_wishlist() {
    let api = common::spawn().await;
    let client = signed_in(&api.base_url);
    client.wishlist.add_to_wishlist(ProductId::new(3)).await.unwrap();

    client.logout();

    assert!(client.wishlist.wishlist().is_none());
    assert!(!client.wishlist.is_in_wishlist(ProductId::new(3)));
}

#[tokio::test]
async fn test_session_logout_hides_cached_wishlist() {
    let api = common::spawn().await;
    let client = signed_in(&api.base_url);
    client.wishlist.add_to_wishlist(ProductId::new(3)).await.unwrap();

    // Session only, the wishlist manager is never told
    client.session.logout();

    assert!(client.wishlist.wishlist().is_none());
    assert!(!client.wishlist.is_in_wishlist(ProductId::new(3)));
    assert_eq!(client.wishlist.item_count(), 0);
}

#[tokio::test]
async fn test_rejected_token_hides_cached_wishlist() {
    let api = common::spawn().await;
    let client = signed_in(&api.base_url);
    client.wishlist.add_to_wishlist(ProductId::new(3)).await.unwrap();
    assert!(client.wishlist.is_in_wishlist(ProductId::new(3)));

    api.state.me_revoked.store(true, Ordering::SeqCst);
    assert!(!client.session.check_auth_status().await.unwrap());

    assert!(!client.wishlist.is_in_wishlist(ProductId::new(3)));
    assert!(client.wishlist.wishlist().is_none());

    // A new login does not resurrect the previous session's cache
    client
        .session
        .login("amira@stes.tn", common::PASSWORD)
        .await
        .unwrap();
    assert!(!client.wishlist.is_in_wishlist(ProductId::new(3)));
}

#[tokio::test]
async fn test_unauthorized_response_logs_out() {
    let api = common::spawn().await;
    let client = StesClient::new(
        ClientConfig::new(&api.base_url).unwrap(),
        Arc::new(MemoryTokenStore::with_token("expired-token")),
    )
    .unwrap();

    let err = client.wishlist.load_wishlist().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!client.session.is_authenticated());

    // Now it fails locally
    assert!(matches!(
        client.wishlist.add_to_wishlist(ProductId::new(1)).await,
        Err(ClientError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_shared_wishlist_is_public() {
    let api = common::spawn().await;
    let client = anonymous(&api.base_url);

    let shared = client
        .wishlist
        .shared(SHARE_TOKEN.parse::<Uuid>().unwrap())
        .await
        .unwrap();
    assert!(shared.is_public);
    assert!(shared.contains(ProductId::new(7)));
    // Shared lists never replace the customer's own
    assert!(client.wishlist.wishlist().is_none());

    let err = client.wishlist.shared(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}
