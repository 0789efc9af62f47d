//! Account, address and wishlist flows against a running storefront.

#![allow(clippy::unwrap_used)]

use stes_client::ClientError;
use stes_core::ProductId;
use stes_core::catalog::ProductQuery;
use stes_core::customer::{AddressInput, UpdateProfileRequest};
use stes_integration_tests::{
    TEST_PASSWORD, client, registration, signed_in_client, throttled, unique_email,
};

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_register_login_logout() {
    let email = unique_email();

    let first = client().unwrap();
    let request = registration(&email);
    let customer = throttled(|| first.session.register(&request)).await.unwrap();
    assert_eq!(customer.email.as_str(), email);
    assert!(first.session.is_authenticated());

    let second = client().unwrap();
    let shouted = email.to_uppercase();
    let logged_in = throttled(|| second.session.login(&shouted, TEST_PASSWORD))
        .await
        .unwrap();
    assert_eq!(logged_in.id, customer.id);
    assert!(second.session.check_auth_status().await.unwrap());

    second.logout();
    assert!(!second.session.check_auth_status().await.unwrap());
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_duplicate_email_conflicts() {
    let email = unique_email();
    let request = registration(&email);
    let first = client().unwrap();
    throttled(|| first.session.register(&request)).await.unwrap();

    let second = client().unwrap();
    let err = throttled(|| second.session.register(&request))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_wrong_password_is_unauthorized() {
    let email = unique_email();
    let request = registration(&email);
    let first = client().unwrap();
    throttled(|| first.session.register(&request)).await.unwrap();

    let client = client().unwrap();
    let err = throttled(|| client.session.login(&email, "definitely-wrong"))
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!client.session.is_authenticated());
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_invalid_registration_lists_fields() {
    let mut request = registration("not-an-email");
    request.password = "short".to_owned();

    let client = client().unwrap();
    let err = throttled(|| client.session.register(&request))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));

    let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_profile_and_password_change() {
    let client = signed_in_client().await.unwrap();

    let updated = client
        .session
        .update_profile(&UpdateProfileRequest {
            name: Some("Sami Ben Ali".to_owned()),
            ..UpdateProfileRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.name, "Sami Ben Ali");

    let err = client
        .session
        .change_password("wrong-current", "Nouveau-mot-2024")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));

    client
        .session
        .change_password(TEST_PASSWORD, "Nouveau-mot-2024")
        .await
        .unwrap();

    let email = client.session.customer().unwrap().email.into_inner();
    let fresh = stes_integration_tests::client().unwrap();
    throttled(|| fresh.session.login(&email, "Nouveau-mot-2024"))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_first_address_becomes_default() {
    let client = signed_in_client().await.unwrap();

    let input = AddressInput {
        label: "Maison".to_owned(),
        street: "12 Rue de Marseille".to_owned(),
        city: "Tunis".to_owned(),
        governorate: "Tunis".to_owned(),
        postal_code: "1000".to_owned(),
        country: "Tunisia".to_owned(),
        phone: None,
        is_default: false,
    };
    let home = client.session.add_address(&input).await.unwrap();
    assert!(home.is_default);

    let office = client
        .session
        .add_address(&AddressInput {
            label: "Bureau".to_owned(),
            city: "Sfax".to_owned(),
            governorate: "Sfax".to_owned(),
            postal_code: "3000".to_owned(),
            ..input
        })
        .await
        .unwrap();
    assert!(!office.is_default);

    client.session.set_default_address(office.id).await.unwrap();
    let addresses = client.session.addresses().await.unwrap();
    assert_eq!(addresses.iter().filter(|a| a.is_default).count(), 1);
    assert!(addresses.iter().any(|a| a.id == office.id && a.is_default));

    client.session.delete_address(home.id).await.unwrap();
    assert_eq!(client.session.addresses().await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_wishlist_round_trip() {
    let client = signed_in_client().await.unwrap();
    let page = client
        .catalog
        .products(&ProductQuery::default())
        .await
        .unwrap();
    let product = page.products.first().unwrap().id;

    assert!(client.wishlist.load_wishlist().await.unwrap().unwrap().is_empty());

    assert!(client.wishlist.toggle_wishlist(product).await.unwrap());
    assert!(client.wishlist.is_in_wishlist(product));

    // Adding twice keeps a single entry
    let wishlist = client.wishlist.add_to_wishlist(product).await.unwrap();
    assert_eq!(wishlist.items.len(), 1);

    let token = wishlist.share_token;
    let anonymous = stes_integration_tests::client().unwrap();
    let err = anonymous.wishlist.shared(token).await.unwrap_err();
    assert_eq!(err.status(), Some(404));

    assert!(!client.wishlist.toggle_wishlist(product).await.unwrap());
    assert_eq!(client.wishlist.item_count(), 0);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_wishlist_unknown_product() {
    let client = signed_in_client().await.unwrap();

    let err = client
        .wishlist
        .add_to_wishlist(ProductId::new(i32::MAX))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_protected_routes_reject_bad_token() {
    let resp = reqwest::Client::new()
        .get(stes_integration_tests::url("/api/customers/me"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    let anonymous = client().unwrap();
    assert!(matches!(
        anonymous.session.me().await,
        Err(ClientError::NotAuthenticated)
    ));
}
