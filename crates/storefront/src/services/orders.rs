//! Order placement and status changes.

use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;

use stes_core::api::FieldError;
use stes_core::order::{
    CustomerSnapshot, Order, OrderItem, OrderLine, OrderTotals, PlaceOrderRequest,
    ShippingAddress, loyalty_points,
};
use stes_core::{CustomerId, OrderStatus, ProductId, StatusTransitionError, TrackingCode};

use crate::db::orders::{self, LockedProduct, OrderDraft};
use crate::db::{AddressRepository, CustomerRepository, OrderRepository, RepositoryError};

/// Attempts at drawing an unused tracking code before giving up.
const TRACKING_CODE_ATTEMPTS: usize = 5;

/// Errors that can occur while placing or updating an order.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request failed field validation.
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// Some products are unknown or no longer sold.
    #[error(
        "products not available: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    UnknownProducts(Vec<ProductId>),

    /// A line asks for more than is in stock.
    #[error("insufficient stock for {name}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        available: i32,
        requested: u32,
    },

    /// The saved address does not belong to the customer.
    #[error("shipping address not found")]
    AddressNotFound,

    #[error("customer not found")]
    CustomerNotFound,

    #[error("order not found")]
    NotFound,

    #[error(transparent)]
    InvalidTransition(#[from] StatusTransitionError),

    /// Every generated tracking code collided.
    #[error("could not allocate a tracking code")]
    TrackingCodeExhausted,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order for `customer_id`.
    ///
    /// Prices come from the catalog. Stock, sales counters, the order, its
    /// first timeline entry and the customer's loyalty points are written
    /// in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for malformed requests,
    /// `OrderError::UnknownProducts` for inactive or missing products and
    /// `OrderError::InsufficientStock` when a line cannot be fulfilled.
    pub async fn place(
        &self,
        customer_id: CustomerId,
        request: PlaceOrderRequest,
    ) -> Result<Order, OrderError> {
        request.validate().map_err(OrderError::Validation)?;

        let customer = CustomerRepository::new(self.pool)
            .get_by_id(customer_id)
            .await?
            .ok_or(OrderError::CustomerNotFound)?;

        let shipping_address = match (request.shipping_address, request.address_id) {
            (Some(address), _) => address,
            (None, Some(address_id)) => AddressRepository::new(self.pool)
                .get(customer_id, address_id)
                .await?
                .map(ShippingAddress::from)
                .ok_or(OrderError::AddressNotFound)?,
            (None, None) => return Err(OrderError::AddressNotFound),
        };

        let mut tx = self.pool.begin().await?;

        let ids: Vec<ProductId> = request.items.iter().map(|l| l.product_id).collect();
        let locked = orders::lock_products(&mut tx, &ids).await?;
        let items = build_items(&request.items, &locked)?;

        let totals = OrderTotals::compute(items.iter().map(|i| (i.unit_price, i.quantity)));
        let tracking_code = allocate_tracking_code(&mut tx).await?;

        let draft = OrderDraft {
            customer_id,
            tracking_code,
            customer: CustomerSnapshot {
                name: customer.name,
                email: customer.email.into_inner(),
                phone: customer.phone,
            },
            shipping_address,
            items,
            totals,
            loyalty_points: loyalty_points(totals.total),
            note: request
                .note
                .map(|n| n.trim().to_owned())
                .filter(|n| !n.is_empty()),
        };

        let order_id = orders::insert_order(&mut tx, &draft).await?;
        tx.commit().await?;

        tracing::info!(
            customer_id = %customer_id,
            order_id = %order_id,
            tracking_code = %draft.tracking_code,
            total = %draft.totals.total,
            "Order placed"
        );

        OrderRepository::new(self.pool)
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    /// Move an order to `status`, appending a timeline entry.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for unknown codes and
    /// `OrderError::InvalidTransition` when the lifecycle forbids the change.
    pub async fn set_status(
        &self,
        code: &TrackingCode,
        status: OrderStatus,
        note: Option<&str>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let (order_id, current) = orders::lock_status(&mut tx, code)
            .await?
            .ok_or(OrderError::NotFound)?;
        let next = current.transition_to(status)?;

        orders::update_status(&mut tx, order_id, next, note).await?;
        tx.commit().await?;

        tracing::info!(tracking_code = %code, from = %current, to = %next, "Order status changed");

        OrderRepository::new(self.pool)
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }
}

/// Price each requested line from the locked catalog rows, keeping the
/// request's line order.
fn build_items(
    lines: &[OrderLine],
    locked: &[LockedProduct],
) -> Result<Vec<OrderItem>, OrderError> {
    let by_id: HashMap<ProductId, &LockedProduct> = locked.iter().map(|p| (p.id, p)).collect();

    let missing: Vec<ProductId> = lines
        .iter()
        .map(|l| l.product_id)
        .filter(|id| !by_id.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(OrderError::UnknownProducts(missing));
    }

    lines
        .iter()
        .filter_map(|line| by_id.get(&line.product_id).map(|p| (line, *p)))
        .map(|(line, product)| {
            let available = product.stock_quantity.max(0);
            if i64::from(line.quantity) > i64::from(available) {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    name: product.name.clone(),
                    available,
                    requested: line.quantity,
                });
            }

            Ok(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                unit_price: product.price,
                quantity: line.quantity,
                line_total: product.price * rust_decimal::Decimal::from(line.quantity),
            })
        })
        .collect()
}

/// Draw tracking codes until one is free.
///
/// Checked up front because a failed insert would abort the transaction.
async fn allocate_tracking_code(
    conn: &mut sqlx::PgConnection,
) -> Result<TrackingCode, OrderError> {
    for _ in 0..TRACKING_CODE_ATTEMPTS {
        let code = TrackingCode::generate(&mut rand::rng());
        if !orders::tracking_code_exists(conn, &code).await? {
            return Ok(code);
        }
        tracing::warn!(tracking_code = %code, "Tracking code collision, retrying");
    }
    Err(OrderError::TrackingCodeExhausted)
}
