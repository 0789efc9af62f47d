//! Notification preferences, push subscriptions and history records.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{FieldError, Validator};
use crate::{DeliveryStatus, NotificationCategory, NotificationChannel, NotificationId};

/// Per-category switches for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFlags {
    pub order_updates: bool,
    pub promotions: bool,
    pub wishlist_alerts: bool,
    pub newsletter: bool,
}

impl CategoryFlags {
    #[must_use]
    pub const fn new(order_updates: bool, promotions: bool, wishlist_alerts: bool, newsletter: bool) -> Self {
        Self {
            order_updates,
            promotions,
            wishlist_alerts,
            newsletter,
        }
    }

    #[must_use]
    pub const fn any_enabled(&self) -> bool {
        self.order_updates || self.promotions || self.wishlist_alerts || self.newsletter
    }

    /// Whether messages of `category` may be sent on this channel.
    #[must_use]
    pub const fn allows(&self, category: NotificationCategory) -> bool {
        match category {
            NotificationCategory::OrderUpdates => self.order_updates,
            NotificationCategory::Promotions => self.promotions,
            NotificationCategory::WishlistAlerts => self.wishlist_alerts,
            NotificationCategory::Newsletter => self.newsletter,
            NotificationCategory::System => self.any_enabled(),
        }
    }
}

/// Window during which push notifications are held back.
///
/// `start == end` means an empty window. A window whose end is before its
/// start wraps past midnight (22:00–08:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub enabled: bool,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
        }
    }
}

impl QuietHours {
    /// Whether `time` falls inside an enabled window.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        if !self.enabled || self.start == self.end {
            return false;
        }
        if self.start < self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// The customer's notification preferences document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email: CategoryFlags,
    pub sms: CategoryFlags,
    pub push: CategoryFlags,
    pub quiet_hours: QuietHours,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: CategoryFlags::new(true, true, true, true),
            sms: CategoryFlags::new(true, false, false, false),
            push: CategoryFlags::new(true, false, true, false),
            quiet_hours: QuietHours::default(),
        }
    }
}

impl NotificationPreferences {
    #[must_use]
    pub const fn channel(&self, channel: NotificationChannel) -> &CategoryFlags {
        match channel {
            NotificationChannel::Email => &self.email,
            NotificationChannel::Sms => &self.sms,
            NotificationChannel::Push => &self.push,
        }
    }

    #[must_use]
    pub const fn allows(&self, channel: NotificationChannel, category: NotificationCategory) -> bool {
        self.channel(channel).allows(category)
    }
}

/// A browser push subscription (`PushSubscription.toJSON()` shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

impl PushSubscription {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        Validator::new()
            .check(
                self.endpoint.starts_with("https://") && self.endpoint.len() <= 2048,
                "endpoint",
                "endpoint must be an https URL",
            )
            .check(!self.keys.p256dh.is_empty(), "keys.p256dh", "p256dh key is required")
            .check(!self.keys.auth.is_empty(), "keys.auth", "auth key is required")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub subscription: PushSubscription,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidPublicKey {
    pub public_key: String,
}

/// One entry of the notification history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub channel: NotificationChannel,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

/// Paged notification history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationHistory {
    pub notifications: Vec<NotificationRecord>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounts {
    pub email: u64,
    pub sms: u64,
    pub push: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub total: u64,
    pub unread: u64,
    pub by_channel: ChannelCounts,
    pub push_subscriptions: u64,
}

/// Result of sending a test notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestNotificationOutcome {
    pub notification: NotificationRecord,
    pub subscriptions: u64,
}

/// Serde adapter for `HH:MM` times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%H:%M";

    /// # Errors
    ///
    /// Never fails for valid times.
    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    /// # Errors
    ///
    /// Fails if the input is not `HH:MM`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT)
            .map_err(|_| D::Error::custom(format!("invalid time '{raw}', expected HH:MM")))
    }
}
