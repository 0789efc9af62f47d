#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use stes_client::{Cart, ClientConfig, ClientError, MemoryTokenStore, ShipTo, StesClient};
use stes_core::ProductId;
use stes_core::catalog::{ProductQuery, ProductSummary};
use stes_core::order::ShippingAddress;

use common::VALID_TOKEN;

fn client(base_url: &str, token: Option<&str>) -> StesClient {
    let store = token.map_or_else(MemoryTokenStore::new, MemoryTokenStore::with_token);
    StesClient::new(ClientConfig::new(base_url).unwrap(), Arc::new(store)).unwrap()
}

fn product(id: i32, price: &str) -> ProductSummary {
    ProductSummary {
        id: ProductId::new(id),
        name: format!("Pompe {id}"),
        price: price.parse().unwrap(),
        image: None,
        brand: Some("Hayward".to_owned()),
        rating: 4.5,
        in_stock: true,
    }
}

fn address() -> ShippingAddress {
    ShippingAddress {
        street: "12 Rue de Marseille".to_owned(),
        city: "Tunis".to_owned(),
        governorate: "Tunis".to_owned(),
        postal_code: "1000".to_owned(),
        country: "Tunisia".to_owned(),
        phone: None,
    }
}

#[tokio::test]
async fn test_blank_filters_are_not_sent() {
    let api = common::spawn().await;
    let client = client(&api.base_url, None);

    let query = ProductQuery {
        category: Some("Filtration".to_owned()),
        brand: Some(String::new()),
        min_price: Some("   ".to_owned()),
        search: Some(String::new()),
        page: Some("2".to_owned()),
        ..ProductQuery::default()
    };
    client.catalog.products(&query).await.unwrap();

    assert_eq!(
        api.state.last_query.lock().unwrap().as_deref(),
        Some("category=Filtration&page=2")
    );
}

#[tokio::test]
async fn test_blank_only_query_sends_no_parameters() {
    let api = common::spawn().await;
    let client = client(&api.base_url, None);

    let blank = ProductQuery {
        category: Some(String::new()),
        sort_by: Some(" ".to_owned()),
        ..ProductQuery::default()
    };
    client.catalog.products(&blank).await.unwrap();
    let with_blanks = api.state.last_query.lock().unwrap().clone();

    client.catalog.products(&ProductQuery::default()).await.unwrap();
    let without = api.state.last_query.lock().unwrap().clone();

    assert_eq!(with_blanks, None);
    assert_eq!(with_blanks, without);
}

#[tokio::test]
async fn test_short_search_skips_request() {
    let api = common::spawn().await;
    let client = client(&api.base_url, None);

    assert!(client.catalog.search(" p ", None).await.unwrap().is_empty());
    assert_eq!(api.state.hits("search"), 0);

    client.catalog.search("pompe", Some(50)).await.unwrap();
    assert_eq!(api.state.hits("search"), 1);
    let sent = api.state.last_query.lock().unwrap().clone().unwrap();
    let mut params: Vec<&str> = sent.split('&').collect();
    params.sort_unstable();
    assert_eq!(params, ["limit=10", "q=pompe"]);
}

#[tokio::test]
async fn test_checkout_clears_cart() {
    let api = common::spawn().await;
    let client = client(&api.base_url, Some(VALID_TOKEN));

    let mut cart = Cart::new();
    cart.add(&product(1, "100.000"), 1).unwrap();

    let order = cart
        .checkout(&client.orders, ShipTo::Address(address()), None)
        .await
        .unwrap();

    assert_eq!(order.tracking_code.as_str(), "STES-7K3M9QPX");
    assert_eq!(order.shipping_address.city, "Tunis");
    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_rejected_checkout_keeps_cart() {
    let api = common::spawn().await;
    let client = client(&api.base_url, Some(VALID_TOKEN));

    let mut cart = Cart::new();
    cart.add(&product(999, "100.000"), 2).unwrap();

    let err = cart
        .checkout(&client.orders, ShipTo::Address(address()), None)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(409));
    assert_eq!(cart.item_count(), 2);
}

#[tokio::test]
async fn test_checkout_requires_items_and_session() {
    let api = common::spawn().await;

    let signed_in = client(&api.base_url, Some(VALID_TOKEN));
    let mut empty = Cart::new();
    assert!(matches!(
        empty
            .checkout(&signed_in.orders, ShipTo::Address(address()), None)
            .await,
        Err(ClientError::Cart(_))
    ));

    let anonymous = client(&api.base_url, None);
    let mut cart = Cart::new();
    cart.add(&product(1, "10.000"), 1).unwrap();
    assert!(matches!(
        cart.checkout(&anonymous.orders, ShipTo::Address(address()), None)
            .await,
        Err(ClientError::NotAuthenticated)
    ));
    assert_eq!(cart.item_count(), 1);
    assert_eq!(api.state.hits("place_order"), 0);
}
