//! Order management commands.
//!
//! # Usage
//!
//! ```bash
//! stes-cli orders set-status STES-7K2QMX9A confirmed
//! stes-cli orders set-status stes-7k2qmx9a shipped --note "Remis au transporteur"
//! ```

use stes_core::{OrderStatus, TrackingCode, TrackingCodeError};
use stes_storefront::services::{OrderError, OrderService};

use super::{ConnectError, connect};

#[derive(Debug, thiserror::Error)]
pub enum OrderCommandError {
    #[error("Invalid tracking code: {0}")]
    InvalidTrackingCode(#[from] TrackingCodeError),

    /// Unknown status name.
    #[error("{0}. Valid statuses: pending, confirmed, processing, shipped, delivered, cancelled")]
    InvalidStatus(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Move an order to `status`, appending a timeline entry.
///
/// # Errors
///
/// Returns an error if the code or status cannot be parsed, the order does
/// not exist, or the lifecycle forbids the change.
pub async fn set_status(
    code: &str,
    status: &str,
    note: Option<&str>,
) -> Result<(), OrderCommandError> {
    let code = TrackingCode::parse(code)?;
    let status: OrderStatus = status
        .trim()
        .to_lowercase()
        .parse()
        .map_err(OrderCommandError::InvalidStatus)?;
    let note = note.map(str::trim).filter(|n| !n.is_empty());

    let pool = connect().await?;
    let order = OrderService::new(&pool)
        .set_status(&code, status, note)
        .await?;

    tracing::info!(
        tracking_code = %order.tracking_code,
        status = %order.status,
        timeline_entries = order.timeline.len(),
        "Order status updated"
    );
    Ok(())
}
