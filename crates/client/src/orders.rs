//! Order calls.

use reqwest::Method;

use stes_core::order::{Order, PlaceOrderRequest, TrackingView};
use stes_core::{OrderId, TrackingCode};

use crate::error::Result;
use crate::http::ApiClient;

#[derive(Debug, Clone)]
pub struct OrderClient {
    api: ApiClient,
}

impl OrderClient {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// # Errors
    ///
    /// Returns an error if the order is invalid, stock is insufficient or
    /// the request fails.
    pub async fn place(&self, request: &PlaceOrderRequest) -> Result<Order> {
        let order: Order = self
            .api
            .send_authed(self.api.authed(Method::POST, "api/orders")?.json(request))
            .await?;

        tracing::info!(tracking_code = %order.tracking_code, "Order placed");
        Ok(order)
    }

    /// The customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn my_orders(&self) -> Result<Vec<Order>> {
        self.api
            .send_authed(self.api.authed(Method::GET, "api/orders/my")?)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the order does not belong to the customer or the
    /// request fails.
    pub async fn get(&self, id: OrderId) -> Result<Order> {
        self.api
            .send_authed(self.api.authed(Method::GET, &format!("api/orders/{id}"))?)
            .await
    }

    /// Public tracking lookup; no session needed.
    ///
    /// # Errors
    ///
    /// Returns an error if no order has this code or the request fails.
    pub async fn track(&self, code: &TrackingCode) -> Result<TrackingView> {
        self.api
            .send(
                self.api
                    .request(Method::GET, &format!("api/orders/track/{code}"))?,
            )
            .await
    }
}
