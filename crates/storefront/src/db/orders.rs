//! Order repository.
//!
//! Reads go through [`OrderRepository`]. Order placement and status changes
//! are multi-statement writes, so they are exposed as functions over a
//! `PgConnection` that the order service drives inside one transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use stes_core::order::{
    CustomerSnapshot, Order, OrderItem, OrderTotals, ShippingAddress, TimelineEntry,
};
use stes_core::{CustomerId, OrderId, OrderStatus, ProductId, TrackingCode};

use super::RepositoryError;

const ORDER_COLUMNS: &str = "id, tracking_code, status, customer_name, customer_email, \
     customer_phone, ship_street, ship_city, ship_governorate, ship_postal_code, ship_country, \
     ship_phone, subtotal, shipping_fee, total, loyalty_points_earned, note, created_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    tracking_code: String,
    status: OrderStatus,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    ship_street: String,
    ship_city: String,
    ship_governorate: String,
    ship_postal_code: String,
    ship_country: String,
    ship_phone: Option<String>,
    subtotal: Decimal,
    shipping_fee: Decimal,
    total: Decimal,
    loyalty_points_earned: i32,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    order_id: OrderId,
    product_id: ProductId,
    name: String,
    unit_price: Decimal,
    quantity: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    order_id: OrderId,
    status: OrderStatus,
    note: Option<String>,
    at: DateTime<Utc>,
}

/// A product row locked for the duration of an order transaction.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub stock_quantity: i32,
}

/// Everything needed to persist a new order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub customer_id: CustomerId,
    pub tracking_code: TrackingCode,
    pub customer: CustomerSnapshot,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub loyalty_points: i32,
    pub note: Option<String>,
}

/// Repository for reading orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order owned by `customer_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_customer(
        &self,
        customer_id: CustomerId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM stes.customer_order WHERE id = $1 AND customer_id = $2"
        ))
        .bind(id)
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(self.assemble(rows).await?.pop())
    }

    /// Get an order by ID regardless of owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM stes.customer_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(self.assemble(rows).await?.pop())
    }

    /// Get an order by tracking code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_tracking_code(
        &self,
        code: &TrackingCode,
    ) -> Result<Option<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM stes.customer_order WHERE tracking_code = $1"
        ))
        .bind(code.as_str())
        .fetch_all(self.pool)
        .await?;

        Ok(self.assemble(rows).await?.pop())
    }

    /// All orders of a customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM stes.customer_order
             WHERE customer_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        self.assemble(rows).await
    }

    /// Attach items and timelines to order rows, keeping the row order.
    async fn assemble(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();

        let items: Vec<ItemRow> = sqlx::query_as(
            r"
            SELECT order_id, product_id, name, unit_price, quantity
            FROM stes.order_item
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let events: Vec<EventRow> = sqlx::query_as(
            r"
            SELECT order_id, status, note, at
            FROM stes.order_event
            WHERE order_id = ANY($1)
            ORDER BY order_id, at, id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let order_items = items
                    .iter()
                    .filter(|i| i.order_id == row.id)
                    .map(|i| {
                        let quantity = u32::try_from(i.quantity).map_err(|_| {
                            RepositoryError::DataCorruption(format!(
                                "negative quantity on order {}",
                                row.id
                            ))
                        })?;
                        Ok(OrderItem {
                            product_id: i.product_id,
                            name: i.name.clone(),
                            unit_price: i.unit_price,
                            quantity,
                            line_total: i.unit_price * Decimal::from(quantity),
                        })
                    })
                    .collect::<Result<Vec<_>, RepositoryError>>()?;

                let timeline = events
                    .iter()
                    .filter(|e| e.order_id == row.id)
                    .map(|e| TimelineEntry {
                        status: e.status,
                        note: e.note.clone(),
                        at: e.at,
                    })
                    .collect();

                to_order(row, order_items, timeline)
            })
            .collect()
    }
}

fn to_order(
    row: OrderRow,
    items: Vec<OrderItem>,
    timeline: Vec<TimelineEntry>,
) -> Result<Order, RepositoryError> {
    let tracking_code = TrackingCode::parse(&row.tracking_code).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid tracking code in database: {e}"))
    })?;

    Ok(Order {
        id: row.id,
        tracking_code,
        status: row.status,
        customer: CustomerSnapshot {
            name: row.customer_name,
            email: row.customer_email,
            phone: row.customer_phone,
        },
        shipping_address: ShippingAddress {
            street: row.ship_street,
            city: row.ship_city,
            governorate: row.ship_governorate,
            postal_code: row.ship_postal_code,
            country: row.ship_country,
            phone: row.ship_phone,
        },
        items,
        totals: OrderTotals {
            subtotal: row.subtotal,
            shipping_fee: row.shipping_fee,
            total: row.total,
        },
        loyalty_points_earned: row.loyalty_points_earned,
        note: row.note,
        timeline,
        created_at: row.created_at,
    })
}

// =============================================================================
// Transactional writes
// =============================================================================

/// Lock the active products among `ids` (`FOR UPDATE`).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_products(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<LockedProduct>, RepositoryError> {
    let ids: Vec<i32> = ids.iter().map(|id| id.as_i32()).collect();
    let rows = sqlx::query_as(
        r"
        SELECT id, name, price, stock_quantity
        FROM stes.product
        WHERE id = ANY($1) AND is_active
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Whether a tracking code is already taken.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn tracking_code_exists(
    conn: &mut PgConnection,
    code: &TrackingCode,
) -> Result<bool, RepositoryError> {
    let exists = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM stes.customer_order WHERE tracking_code = $1)",
    )
    .bind(code.as_str())
    .fetch_one(conn)
    .await?;

    Ok(exists)
}

/// Persist an order: the order row, its items, the first timeline entry,
/// stock and sales counters, and the customer's loyalty points.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the tracking code is taken.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn insert_order(
    conn: &mut PgConnection,
    draft: &OrderDraft,
) -> Result<OrderId, RepositoryError> {
    let order_id: OrderId = sqlx::query_scalar(
        r"
        INSERT INTO stes.customer_order (
            customer_id, tracking_code, status,
            customer_name, customer_email, customer_phone,
            ship_street, ship_city, ship_governorate, ship_postal_code, ship_country, ship_phone,
            subtotal, shipping_fee, total, loyalty_points_earned, note
        )
        VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING id
        ",
    )
    .bind(draft.customer_id)
    .bind(draft.tracking_code.as_str())
    .bind(&draft.customer.name)
    .bind(&draft.customer.email)
    .bind(&draft.customer.phone)
    .bind(&draft.shipping_address.street)
    .bind(&draft.shipping_address.city)
    .bind(&draft.shipping_address.governorate)
    .bind(&draft.shipping_address.postal_code)
    .bind(&draft.shipping_address.country)
    .bind(&draft.shipping_address.phone)
    .bind(draft.totals.subtotal)
    .bind(draft.totals.shipping_fee)
    .bind(draft.totals.total)
    .bind(draft.loyalty_points)
    .bind(&draft.note)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::from_unique_violation(e, "tracking code already exists"))?;

    for (position, item) in (1_i32..).zip(&draft.items) {
        let quantity = i32::try_from(item.quantity)
            .map_err(|_| RepositoryError::DataCorruption("quantity out of range".into()))?;

        sqlx::query(
            r"
            INSERT INTO stes.order_item (order_id, position, product_id, name, unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(order_id)
        .bind(position)
        .bind(item.product_id)
        .bind(&item.name)
        .bind(item.unit_price)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r"
            UPDATE stes.product
            SET stock_quantity = stock_quantity - $2,
                sales_count = sales_count + $2,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(item.product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    }

    append_event(conn, order_id, OrderStatus::Pending, None).await?;

    sqlx::query(
        "UPDATE stes.customer SET loyalty_points = loyalty_points + $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(draft.customer_id)
    .bind(draft.loyalty_points)
    .execute(&mut *conn)
    .await?;

    Ok(order_id)
}

/// Lock an order by tracking code and return its ID and status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_status(
    conn: &mut PgConnection,
    code: &TrackingCode,
) -> Result<Option<(OrderId, OrderStatus)>, RepositoryError> {
    let row = sqlx::query_as(
        "SELECT id, status FROM stes.customer_order WHERE tracking_code = $1 FOR UPDATE",
    )
    .bind(code.as_str())
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Set an order's status and append a timeline entry.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn update_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
    note: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE stes.customer_order SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(&mut *conn)
        .await?;

    append_event(conn, id, status, note).await
}

async fn append_event(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
    note: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO stes.order_event (order_id, status, note) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(status)
        .bind(note)
        .execute(conn)
        .await?;
    Ok(())
}
