//! Orders, pricing rules and public tracking views.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::api::{FieldError, Validator};
use crate::customer::{Address, is_valid_phone};
use crate::{AddressId, OrderId, OrderStatus, ProductId, TrackingCode};

/// Subtotal from which shipping is free (TND).
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(300, 0, 0, false, 0);

/// Flat shipping fee below the threshold (TND).
pub const STANDARD_SHIPPING_FEE: Decimal = Decimal::from_parts(7, 0, 0, false, 0);

/// Order total (TND) that earns one loyalty point.
pub const TND_PER_LOYALTY_POINT: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

pub const MAX_LINES_PER_ORDER: usize = 20;
pub const MAX_QUANTITY_PER_LINE: u32 = 99;

/// Shipping fee for a given subtotal.
#[must_use]
pub fn shipping_fee(subtotal: Decimal) -> Decimal {
    if subtotal.is_zero() || subtotal >= FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        STANDARD_SHIPPING_FEE
    }
}

/// Loyalty points earned by an order total: one per full 10 TND.
#[must_use]
pub fn loyalty_points(total: Decimal) -> i32 {
    (total / TND_PER_LOYALTY_POINT)
        .floor()
        .to_i32()
        .unwrap_or(0)
        .max(0)
}

/// Subtotal, shipping and total of a set of `(unit_price, quantity)` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    pub fn compute(lines: impl IntoIterator<Item = (Decimal, u32)>) -> Self {
        let subtotal: Decimal = lines
            .into_iter()
            .map(|(price, qty)| price * Decimal::from(qty))
            .sum();
        let shipping_fee = shipping_fee(subtotal);
        Self {
            subtotal,
            shipping_fee,
            total: subtotal + shipping_fee,
        }
    }
}

/// Where an order ships. Copied into the order so later address edits do
/// not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub governorate: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl From<Address> for ShippingAddress {
    fn from(address: Address) -> Self {
        Self {
            street: address.street,
            city: address.city,
            governorate: address.governorate,
            postal_code: address.postal_code,
            country: address.country,
            phone: address.phone,
        }
    }
}

/// One requested line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Checkout request. Give either an inline address or a saved one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_id: Option<AddressId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PlaceOrderRequest {
    /// Structural validation; stock and prices are checked by the server.
    ///
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut seen = std::collections::HashSet::new();
        let unique = self.items.iter().all(|line| seen.insert(line.product_id));

        let mut v = Validator::new();
        v.check(!self.items.is_empty(), "items", "order must contain at least one item")
            .check(
                self.items.len() <= MAX_LINES_PER_ORDER,
                "items",
                "order has too many distinct items",
            )
            .check(unique, "items", "each product may appear only once")
            .check(
                self.items
                    .iter()
                    .all(|l| (1..=MAX_QUANTITY_PER_LINE).contains(&l.quantity)),
                "items.quantity",
                "quantity must be between 1 and 99",
            )
            .check(
                self.shipping_address.is_some() != self.address_id.is_some(),
                "shippingAddress",
                "provide either shippingAddress or addressId",
            )
            .check(
                self.note.as_deref().is_none_or(|n| n.chars().count() <= 500),
                "note",
                "note must be at most 500 characters",
            );

        if let Some(address) = &self.shipping_address {
            v.required(&address.street, "shippingAddress.street", 200)
                .required(&address.city, "shippingAddress.city", 80)
                .required(&address.governorate, "shippingAddress.governorate", 80)
                .required(&address.country, "shippingAddress.country", 80)
                .check(
                    address.postal_code.len() == 4
                        && address.postal_code.chars().all(|c| c.is_ascii_digit()),
                    "shippingAddress.postalCode",
                    "postal code must be 4 digits",
                )
                .check(
                    address.phone.as_deref().is_none_or(is_valid_phone),
                    "shippingAddress.phone",
                    "phone number must contain 8 to 15 digits",
                );
        }

        v.finish()
    }
}

/// Who placed the order, as it was at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// A full order, visible to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub tracking_code: TrackingCode,
    pub status: OrderStatus,
    pub customer: CustomerSnapshot,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub loyalty_points_earned: i32,
    #[serde(default)]
    pub note: Option<String>,
    pub timeline: Vec<TimelineEntry>,
    pub created_at: DateTime<Utc>,
}

/// What an anonymous tracking lookup reveals: no names or addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub tracking_code: TrackingCode,
    pub status: OrderStatus,
    pub item_count: u32,
    pub city: String,
    pub timeline: Vec<TimelineEntry>,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for TrackingView {
    fn from(order: &Order) -> Self {
        Self {
            tracking_code: order.tracking_code.clone(),
            status: order.status,
            item_count: order.items.iter().map(|i| i.quantity).sum(),
            city: order.shipping_address.city.clone(),
            timeline: order.timeline.clone(),
            created_at: order.created_at,
        }
    }
}
