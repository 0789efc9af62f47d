//! Notification preferences, push subscriptions and test notifications.
//!
//! Push delivery itself is out of scope: a test notification is recorded in
//! history with the status it would have been delivered with.

use chrono::{FixedOffset, NaiveTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use stes_core::api::FieldError;
use stes_core::notification::{
    NotificationHistory, NotificationPreferences, NotificationStats, PushSubscription,
    TestNotificationOutcome,
};
use stes_core::{CustomerId, DeliveryStatus, NotificationCategory, NotificationChannel};

use crate::db::notifications::NewNotification;
use crate::db::{NotificationRepository, RepositoryError};

/// Quiet hours are evaluated in Tunisian local time (UTC+1, no DST).
const LOCAL_UTC_OFFSET_SECS: i32 = 3600;

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;
pub const MAX_HISTORY_LIMIT: u32 = 100;

const TEST_TITLE: &str = "Notification de test";
const TEST_BODY: &str = "Les notifications STES.tn sont bien activées sur cet appareil.";

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// Every push category is switched off.
    #[error("push notifications are disabled in your preferences")]
    PushDisabled,

    #[error("subscription not found")]
    SubscriptionNotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct NotificationService<'a> {
    notifications: NotificationRepository<'a>,
}

impl<'a> NotificationService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            notifications: NotificationRepository::new(pool),
        }
    }

    /// Saved preferences, or the defaults if none were saved yet.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if the query fails.
    pub async fn preferences(
        &self,
        customer_id: CustomerId,
    ) -> Result<NotificationPreferences, NotificationError> {
        Ok(self
            .notifications
            .preferences(customer_id)
            .await?
            .unwrap_or_default())
    }

    /// Replace the preferences document.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if the query fails.
    pub async fn save_preferences(
        &self,
        customer_id: CustomerId,
        preferences: &NotificationPreferences,
    ) -> Result<NotificationPreferences, NotificationError> {
        self.notifications
            .save_preferences(customer_id, preferences)
            .await?;
        Ok(*preferences)
    }

    /// Store or re-assign a push subscription.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Validation` for malformed subscriptions.
    pub async fn subscribe(
        &self,
        customer_id: CustomerId,
        subscription: &PushSubscription,
        user_agent: Option<&str>,
    ) -> Result<(), NotificationError> {
        subscription
            .validate()
            .map_err(NotificationError::Validation)?;

        self.notifications
            .upsert_subscription(customer_id, subscription, user_agent)
            .await?;

        tracing::info!(customer_id = %customer_id, "Push subscription stored");
        Ok(())
    }

    /// Remove the caller's subscription for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::SubscriptionNotFound` if the caller has none.
    pub async fn unsubscribe(
        &self,
        customer_id: CustomerId,
        endpoint: &str,
    ) -> Result<(), NotificationError> {
        if self
            .notifications
            .delete_subscription(customer_id, endpoint)
            .await?
        {
            tracing::info!(customer_id = %customer_id, "Push subscription removed");
            Ok(())
        } else {
            Err(NotificationError::SubscriptionNotFound)
        }
    }

    /// One page of history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if a query fails.
    pub async fn history(
        &self,
        customer_id: CustomerId,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<NotificationHistory, NotificationError> {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .min(MAX_HISTORY_LIMIT);

        let (notifications, total) = self
            .notifications
            .history(customer_id, page, limit)
            .await?;

        Ok(NotificationHistory {
            notifications,
            page,
            limit,
            total,
        })
    }

    /// # Errors
    ///
    /// Returns `NotificationError::Repository` if a query fails.
    pub async fn stats(&self, customer_id: CustomerId) -> Result<NotificationStats, NotificationError> {
        Ok(self.notifications.stats(customer_id).await?)
    }

    /// Record a test push notification.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::PushDisabled` if every push category is off.
    pub async fn send_test(
        &self,
        customer_id: CustomerId,
    ) -> Result<TestNotificationOutcome, NotificationError> {
        let preferences = self.preferences(customer_id).await?;
        let subscriptions = self.notifications.subscription_count(customer_id).await?;

        let status = test_delivery_status(&preferences, subscriptions, local_time())
            .ok_or(NotificationError::PushDisabled)?;

        let notification = self
            .notifications
            .record(
                customer_id,
                &NewNotification {
                    channel: NotificationChannel::Push,
                    category: NotificationCategory::System,
                    title: TEST_TITLE,
                    body: TEST_BODY,
                    status,
                },
            )
            .await?;

        tracing::info!(customer_id = %customer_id, status = ?status, "Test notification recorded");

        Ok(TestNotificationOutcome {
            notification,
            subscriptions,
        })
    }
}

/// Status a test push would be recorded with, or `None` if push is off.
fn test_delivery_status(
    preferences: &NotificationPreferences,
    subscriptions: u64,
    now: NaiveTime,
) -> Option<DeliveryStatus> {
    if !preferences.allows(NotificationChannel::Push, NotificationCategory::System) {
        return None;
    }

    Some(if preferences.quiet_hours.contains(now) {
        DeliveryStatus::Suppressed
    } else if subscriptions == 0 {
        DeliveryStatus::NoSubscription
    } else {
        DeliveryStatus::Queued
    })
}

fn local_time() -> NaiveTime {
    let now = Utc::now();
    FixedOffset::east_opt(LOCAL_UTC_OFFSET_SECS)
        .map_or_else(|| now.time(), |offset| now.with_timezone(&offset).time())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stes_core::notification::{CategoryFlags, QuietHours};

    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn with_quiet_hours() -> NotificationPreferences {
        NotificationPreferences {
            quiet_hours: QuietHours {
                enabled: true,
                start: at(22, 0),
                end: at(8, 0),
            },
            ..NotificationPreferences::default()
        }
    }

    #[test]
    fn test_push_disabled_records_nothing() {
        let prefs = NotificationPreferences {
            push: CategoryFlags::new(false, false, false, false),
            ..NotificationPreferences::default()
        };
        assert_eq!(test_delivery_status(&prefs, 3, at(12, 0)), None);
    }

    #[test]
    fn test_quiet_hours_suppress() {
        let prefs = with_quiet_hours();
        assert_eq!(
            test_delivery_status(&prefs, 1, at(23, 30)),
            Some(DeliveryStatus::Suppressed)
        );
        assert_eq!(
            test_delivery_status(&prefs, 1, at(12, 0)),
            Some(DeliveryStatus::Queued)
        );
    }

    #[test]
    fn test_deliverable_push_is_queued() {
        // Nothing sends pushes, so it never claims `sent`
        let status = test_delivery_status(&NotificationPreferences::default(), 2, at(12, 0));
        assert_eq!(status, Some(DeliveryStatus::Queued));
        assert_ne!(status, Some(DeliveryStatus::Sent));
    }

    #[test]
    fn test_without_subscription() {
        assert_eq!(
            test_delivery_status(&NotificationPreferences::default(), 0, at(12, 0)),
            Some(DeliveryStatus::NoSubscription)
        );
    }

    #[test]
    fn test_quiet_hours_take_precedence_over_missing_subscription() {
        assert_eq!(
            test_delivery_status(&with_quiet_hours(), 0, at(6, 0)),
            Some(DeliveryStatus::Suppressed)
        );
    }
}
