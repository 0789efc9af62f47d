//! Notification endpoints against a running storefront.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::Value;
use stes_integration_tests::url;

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_vapid_key_is_public() {
    let resp = reqwest::get(url("/api/notifications/vapid-public-key"))
        .await
        .unwrap();

    // 503 when the server runs without push keys
    match resp.status() {
        StatusCode::OK => {
            let body: Value = resp.json().await.unwrap();
            assert!(body["data"]["publicKey"].as_str().is_some_and(|k| !k.is_empty()));
        }
        status => assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE),
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_preferences_require_token() {
    let http = reqwest::Client::new();

    for path in [
        "/api/notifications/preferences",
        "/api/notifications/history",
        "/api/notifications/stats",
    ] {
        let resp = http.get(url(path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
}
