//! Local shopping cart.
//!
//! The cart never talks to the server until checkout. Totals use the same
//! shipping rule as the server, but the server re-prices every order from
//! the database, so these figures are a preview.

use rust_decimal::Decimal;

use stes_core::catalog::ProductSummary;
use stes_core::order::{
    MAX_LINES_PER_ORDER, MAX_QUANTITY_PER_LINE, Order, OrderLine, OrderTotals, PlaceOrderRequest,
    ShippingAddress,
};
use stes_core::{AddressId, ProductId};

use crate::error::Result;
use crate::orders::OrderClient;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Cart is empty")]
    Empty,

    #[error("Cart cannot hold more than {MAX_LINES_PER_ORDER} different products")]
    Full,

    #[error("{0} is out of stock")]
    OutOfStock(String),
}

/// Where a checkout ships to.
#[derive(Debug, Clone)]
pub enum ShipTo {
    Saved(AddressId),
    Address(ShippingAddress),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product: ProductSummary,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add `quantity` units, merging with an existing line. Quantities are
    /// capped at the per-line maximum.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is out of stock or the cart already
    /// holds the maximum number of distinct products.
    pub fn add(&mut self, product: &ProductSummary, quantity: u32) -> Result<(), CartError> {
        if !product.in_stock {
            return Err(CartError::OutOfStock(product.name.clone()));
        }
        if quantity == 0 {
            return Ok(());
        }

        if let Some(line) = self.line_mut(product.id) {
            line.quantity = line
                .quantity
                .saturating_add(quantity)
                .min(MAX_QUANTITY_PER_LINE);
            line.product = product.clone();
            return Ok(());
        }

        if self.lines.len() >= MAX_LINES_PER_ORDER {
            return Err(CartError::Full);
        }
        self.lines.push(CartLine {
            product: product.clone(),
            quantity: quantity.min(MAX_QUANTITY_PER_LINE),
        });
        Ok(())
    }

    /// Set a line's quantity. Zero removes the line.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
        } else if let Some(line) = self.line_mut(product_id) {
            line.quantity = quantity.min(MAX_QUANTITY_PER_LINE);
        }
    }

    pub fn remove(&mut self, product_id: ProductId) {
        self.lines.retain(|line| line.product.id != product_id);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    #[must_use]
    pub fn totals(&self) -> OrderTotals {
        OrderTotals::compute(
            self.lines
                .iter()
                .map(|line| (line.product.price, line.quantity)),
        )
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.totals().subtotal
    }

    #[must_use]
    pub fn shipping_fee(&self) -> Decimal {
        self.totals().shipping_fee
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        self.totals().total
    }

    /// The order request this cart would place.
    #[must_use]
    pub fn to_order_request(&self, ship_to: ShipTo, note: Option<String>) -> PlaceOrderRequest {
        let (shipping_address, address_id) = match ship_to {
            ShipTo::Saved(id) => (None, Some(id)),
            ShipTo::Address(address) => (Some(address), None),
        };

        PlaceOrderRequest {
            items: self
                .lines
                .iter()
                .map(|line| OrderLine {
                    product_id: line.product.id,
                    quantity: line.quantity,
                })
                .collect(),
            shipping_address,
            address_id,
            note,
        }
    }

    /// Place the order and empty the cart once the server accepts it. On
    /// failure the cart is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart is empty or the order is rejected.
    pub async fn checkout(
        &mut self,
        orders: &OrderClient,
        ship_to: ShipTo,
        note: Option<String>,
    ) -> Result<Order> {
        if self.is_empty() {
            return Err(CartError::Empty.into());
        }

        let order = orders.place(&self.to_order_request(ship_to, note)).await?;
        self.clear();
        Ok(order)
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|line| line.product.id == product_id)
    }
}
