//! In-process fake of the storefront API.
//!
//! Serves just enough of the real routes, with the real envelopes, for the
//! client tests. Bound to `127.0.0.1:0` so tests run in parallel.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

pub const VALID_TOKEN: &str = "valid-token";
pub const PASSWORD: &str = "correct-password";
pub const SHARE_TOKEN: &str = "6f1c3c1e-6b7a-4a53-9d4c-1f1e5f0b2a10";

#[derive(Default)]
pub struct FakeState {
    hits: Mutex<HashMap<&'static str, usize>>,
    pub wishlist: Mutex<Vec<i32>>,
    pub subscriptions: Mutex<Vec<String>>,
    pub last_query: Mutex<Option<String>>,
    pub vapid_disabled: AtomicBool,
    /// Delay before answering `GET /api/wishlist`.
    pub wishlist_delay_ms: AtomicU64,
    /// Delay before answering `GET /api/customers/me`.
    pub me_delay_ms: AtomicU64,
    /// Makes `GET /api/customers/me` reject every token.
    pub me_revoked: AtomicBool,
}

impl FakeState {
    fn hit(&self, route: &'static str) {
        *self.hits.lock().unwrap().entry(route).or_default() += 1;
    }

    pub fn hits(&self, route: &str) -> usize {
        self.hits.lock().unwrap().get(route).copied().unwrap_or(0)
    }
}

pub struct FakeApi {
    pub base_url: String,
    pub state: Arc<FakeState>,
}

/// Start the fake API on an ephemeral port.
pub async fn spawn() -> FakeApi {
    let state = Arc::new(FakeState::default());

    let app = Router::new()
        .route("/api/customers/login", post(login))
        .route("/api/customers/register", post(register))
        .route("/api/customers/me", get(me))
        .route("/api/products", get(products))
        .route("/api/products/search", get(search))
        .route("/api/wishlist", get(wishlist).delete(clear_wishlist))
        .route("/api/wishlist/items", post(add_item))
        .route("/api/wishlist/items/{id}", delete(remove_item))
        .route("/api/wishlist/toggle/{id}", post(toggle))
        .route("/api/wishlist/shared/{token}", get(shared))
        .route("/api/notifications/vapid-public-key", get(vapid))
        .route("/api/notifications/subscribe", post(subscribe))
        .route("/api/notifications/unsubscribe", post(unsubscribe))
        .route("/api/orders", post(place_order))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeApi {
        base_url: format!("http://{addr}"),
        state,
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn customer_json() -> Value {
    json!({
        "id": 42,
        "name": "Amira Ben Salah",
        "email": "amira@stes.tn",
        "phone": null,
        "loyaltyPoints": 12,
        "createdAt": "2024-06-01T10:00:00Z"
    })
}

fn wishlist_json(products: &[i32]) -> Value {
    json!({
        "id": 1,
        "name": "Ma liste de souhaits",
        "description": null,
        "isPublic": false,
        "shareToken": SHARE_TOKEN,
        "items": products.iter().map(|id| json!({
            "productId": id,
            "product": null,
            "snapshot": {"name": format!("Produit {id}"), "price": "120.000", "image": null},
            "addedAt": "2024-06-01T10:00:00Z"
        })).collect::<Vec<_>>(),
        "updatedAt": "2024-06-01T10:00:00Z"
    })
}

fn ok(data: Value) -> Response {
    Json(json!({"success": true, "data": data})).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"success": false, "message": message}))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {VALID_TOKEN}"))
}

fn unauthorized() -> Response {
    error(StatusCode::UNAUTHORIZED, "Invalid or expired token")
}

// =============================================================================
// Handlers
// =============================================================================

async fn login(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Response {
    state.hit("login");
    if body["password"] == PASSWORD {
        ok(json!({"customer": customer_json(), "token": VALID_TOKEN}))
    } else {
        error(StatusCode::UNAUTHORIZED, "Invalid email or password")
    }
}

async fn register(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Response {
    state.hit("register");
    if body["email"] == "taken@stes.tn" {
        return error(StatusCode::CONFLICT, "An account with this email already exists");
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {"customer": customer_json(), "token": VALID_TOKEN}
        })),
    )
        .into_response()
}

async fn me(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    state.hit("me");
    let delay = state.me_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if authorized(&headers) && !state.me_revoked.load(Ordering::SeqCst) {
        ok(customer_json())
    } else {
        unauthorized()
    }
}

async fn products(State(state): State<Arc<FakeState>>, RawQuery(query): RawQuery) -> Response {
    state.hit("products");
    *state.last_query.lock().unwrap() = query;
    ok(json!({
        "products": [],
        "pagination": {
            "currentPage": 1,
            "totalPages": 0,
            "totalProducts": 0,
            "hasNext": false,
            "hasPrev": false
        }
    }))
}

async fn search(State(state): State<Arc<FakeState>>, RawQuery(query): RawQuery) -> Response {
    state.hit("search");
    *state.last_query.lock().unwrap() = query;
    ok(json!([]))
}

async fn wishlist(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    state.hit("wishlist");
    if !authorized(&headers) {
        return unauthorized();
    }
    // Snapshot before sleeping so a slow response carries stale data
    let items = state.wishlist.lock().unwrap().clone();
    let delay = state.wishlist_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    ok(wishlist_json(&items))
}

async fn clear_wishlist(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.wishlist.lock().unwrap().clear();
    ok(wishlist_json(&[]))
}

async fn add_item(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("add_item");
    if !authorized(&headers) {
        return unauthorized();
    }
    let Some(id) = body["productId"].as_i64().and_then(|id| i32::try_from(id).ok()) else {
        return error(StatusCode::BAD_REQUEST, "Invalid request body");
    };
    let items = {
        let mut items = state.wishlist.lock().unwrap();
        if !items.contains(&id) {
            items.push(id);
        }
        items.clone()
    };
    ok(wishlist_json(&items))
}

async fn remove_item(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let items = {
        let mut items = state.wishlist.lock().unwrap();
        let before = items.len();
        items.retain(|p| *p != id);
        if items.len() == before {
            return error(StatusCode::NOT_FOUND, "Product is not in the wishlist");
        }
        items.clone()
    };
    ok(wishlist_json(&items))
}

async fn toggle(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let (items, added) = {
        let mut items = state.wishlist.lock().unwrap();
        let added = if items.contains(&id) {
            items.retain(|p| *p != id);
            false
        } else {
            items.push(id);
            true
        };
        (items.clone(), added)
    };
    ok(json!({"wishlist": wishlist_json(&items), "added": added}))
}

async fn shared(Path(token): Path<String>) -> Response {
    if token == SHARE_TOKEN {
        let mut wishlist = wishlist_json(&[7]);
        wishlist["isPublic"] = json!(true);
        ok(wishlist)
    } else {
        error(StatusCode::NOT_FOUND, "Wishlist not found")
    }
}

async fn vapid(State(state): State<Arc<FakeState>>) -> Response {
    state.hit("vapid");
    if state.vapid_disabled.load(Ordering::SeqCst) {
        return error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Push notifications are not configured",
        );
    }
    ok(json!({"publicKey": "BPublicKeyForTests"}))
}

async fn subscribe(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("subscribe");
    if !authorized(&headers) {
        return unauthorized();
    }
    let endpoint = body["subscription"]["endpoint"]
        .as_str()
        .unwrap_or_default()
        .to_owned();
    state.subscriptions.lock().unwrap().push(endpoint);
    (
        StatusCode::CREATED,
        Json(json!({"success": true, "data": {"message": "Subscribed to push notifications"}})),
    )
        .into_response()
}

async fn unsubscribe(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("unsubscribe");
    if !authorized(&headers) {
        return unauthorized();
    }
    let endpoint = body["endpoint"].as_str().unwrap_or_default();
    let mut subscriptions = state.subscriptions.lock().unwrap();
    let before = subscriptions.len();
    subscriptions.retain(|e| e != endpoint);
    if subscriptions.len() == before {
        return error(StatusCode::NOT_FOUND, "Subscription not found");
    }
    ok(json!({"message": "Unsubscribed from push notifications"}))
}

async fn place_order(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("place_order");
    if !authorized(&headers) {
        return unauthorized();
    }
    let items = body["items"].as_array().cloned().unwrap_or_default();
    if items.iter().any(|line| line["productId"] == 999) {
        return error(StatusCode::CONFLICT, "Insufficient stock for Pompe 999");
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "id": 1,
                "trackingCode": "STES-7K3M9QPX",
                "status": "pending",
                "customer": {"name": "Amira Ben Salah", "email": "amira@stes.tn", "phone": null},
                "shippingAddress": body["shippingAddress"],
                "items": items.iter().map(|line| json!({
                    "productId": line["productId"],
                    "name": "Pompe",
                    "unitPrice": "100.000",
                    "quantity": line["quantity"],
                    "lineTotal": "100.000"
                })).collect::<Vec<_>>(),
                "totals": {"subtotal": "100.000", "shippingFee": "7.000", "total": "107.000"},
                "loyaltyPointsEarned": 10,
                "note": null,
                "timeline": [{"status": "pending", "note": null, "at": "2024-06-01T10:00:00Z"}],
                "createdAt": "2024-06-01T10:00:00Z"
            }
        })),
    )
        .into_response()
}
