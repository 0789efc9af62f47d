//! Notification preferences, push subscriptions and history.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use stes_core::notification::{
    ChannelCounts, NotificationPreferences, NotificationRecord, NotificationStats,
    PushSubscription,
};
use stes_core::{
    CustomerId, DeliveryStatus, NotificationCategory, NotificationChannel, NotificationId,
};

use super::RepositoryError;

const NOTIFICATION_COLUMNS: &str = "id, channel, category, title, body, status, created_at, read_at";

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: NotificationId,
    channel: NotificationChannel,
    category: NotificationCategory,
    title: String,
    body: String,
    status: DeliveryStatus,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            channel: row.channel,
            category: row.category,
            title: row.title,
            body: row.body,
            status: row.status,
            created_at: row.created_at,
            read_at: row.read_at,
        }
    }
}

/// A notification about to be recorded.
#[derive(Debug, Clone)]
pub struct NewNotification<'n> {
    pub channel: NotificationChannel,
    pub category: NotificationCategory,
    pub title: &'n str,
    pub body: &'n str,
    pub status: DeliveryStatus,
}

/// Repository for notification data.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Stored preferences, or `None` if the customer never saved any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails or the stored
    /// document no longer deserializes.
    pub async fn preferences(
        &self,
        customer_id: CustomerId,
    ) -> Result<Option<NotificationPreferences>, RepositoryError> {
        let row: Option<Json<NotificationPreferences>> = sqlx::query_scalar(
            "SELECT preferences FROM stes.notification_preferences WHERE customer_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|Json(prefs)| prefs))
    }

    /// Replace the preferences document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_preferences(
        &self,
        customer_id: CustomerId,
        preferences: &NotificationPreferences,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO stes.notification_preferences (customer_id, preferences)
            VALUES ($1, $2)
            ON CONFLICT (customer_id) DO UPDATE
            SET preferences = EXCLUDED.preferences, updated_at = NOW()
            ",
        )
        .bind(customer_id)
        .bind(Json(preferences))
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Store a push subscription. An endpoint already known is re-assigned
    /// to `customer_id` with fresh keys.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_subscription(
        &self,
        customer_id: CustomerId,
        subscription: &PushSubscription,
        user_agent: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO stes.push_subscription (customer_id, endpoint, p256dh, auth, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (endpoint) DO UPDATE
            SET customer_id = EXCLUDED.customer_id,
                p256dh = EXCLUDED.p256dh,
                auth = EXCLUDED.auth,
                user_agent = EXCLUDED.user_agent,
                updated_at = NOW()
            ",
        )
        .bind(customer_id)
        .bind(&subscription.endpoint)
        .bind(&subscription.keys.p256dh)
        .bind(&subscription.keys.auth)
        .bind(user_agent)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete the caller's subscription for `endpoint`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_subscription(
        &self,
        customer_id: CustomerId,
        endpoint: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM stes.push_subscription WHERE customer_id = $1 AND endpoint = $2",
        )
        .bind(customer_id)
        .bind(endpoint)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of push subscriptions of a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn subscription_count(&self, customer_id: CustomerId) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM stes.push_subscription WHERE customer_id = $1")
                .bind(customer_id)
                .fetch_one(self.pool)
                .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Append a history entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record(
        &self,
        customer_id: CustomerId,
        notification: &NewNotification<'_>,
    ) -> Result<NotificationRecord, RepositoryError> {
        let row: NotificationRow = sqlx::query_as(&format!(
            "INSERT INTO stes.notification (customer_id, channel, category, title, body, status)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(customer_id)
        .bind(notification.channel)
        .bind(notification.category)
        .bind(notification.title)
        .bind(notification.body)
        .bind(notification.status)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// One page of history, newest first, with the total entry count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn history(
        &self,
        customer_id: CustomerId,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<NotificationRecord>, u64), RepositoryError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM stes.notification WHERE customer_id = $1")
                .bind(customer_id)
                .fetch_one(self.pool)
                .await?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM stes.notification
             WHERE customer_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(customer_id)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok((
            rows.into_iter().map(NotificationRecord::from).collect(),
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    /// Totals, unread count and per-channel counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn stats(&self, customer_id: CustomerId) -> Result<NotificationStats, RepositoryError> {
        let (total, unread, email, sms, push): (i64, i64, i64, i64, i64) = sqlx::query_as(
            r"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE read_at IS NULL),
                   COUNT(*) FILTER (WHERE channel = 'email'),
                   COUNT(*) FILTER (WHERE channel = 'sms'),
                   COUNT(*) FILTER (WHERE channel = 'push')
            FROM stes.notification
            WHERE customer_id = $1
            ",
        )
        .bind(customer_id)
        .fetch_one(self.pool)
        .await?;

        let count = |n: i64| u64::try_from(n).unwrap_or_default();
        Ok(NotificationStats {
            total: count(total),
            unread: count(unread),
            by_channel: ChannelCounts {
                email: count(email),
                sms: count(sms),
                push: count(push),
            },
            push_subscriptions: self.subscription_count(customer_id).await?,
        })
    }
}
