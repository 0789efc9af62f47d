//! Wishlist shapes.
//!
//! Every item carries its `productId`. The current product summary is
//! attached when the product still exists and is active; the snapshot keeps
//! what the customer saw when they saved it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{FieldError, Validator};
use crate::catalog::{Product, ProductSummary};
use crate::{ProductId, WishlistId};

/// Name given to a wishlist created on first use.
pub const DEFAULT_WISHLIST_NAME: &str = "Ma liste de souhaits";

/// A customer's wishlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wishlist {
    pub id: WishlistId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_public: bool,
    pub share_token: Uuid,
    pub items: Vec<WishlistItem>,
    pub updated_at: DateTime<Utc>,
}

impl Wishlist {
    /// Whether `product_id` is saved in this wishlist.
    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|item| item.product_id == product_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One saved product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub product: Option<ProductSummary>,
    pub snapshot: ProductSnapshot,
    pub added_at: DateTime<Utc>,
}

/// Product details captured when an item was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
}

impl From<&Product> for ProductSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price,
            image: product.primary_image().map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
}

/// Partial update of wishlist metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

impl WishlistSettings {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        if let Some(name) = &self.name {
            v.required(name, "name", 100);
        }
        v.check(
            self.description
                .as_deref()
                .is_none_or(|d| d.chars().count() <= 500),
            "description",
            "description must be at most 500 characters",
        )
        .finish()
    }
}

/// Response of a toggle call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub wishlist: Wishlist,
    /// `true` if the product was added, `false` if it was removed.
    pub added: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistCheck {
    pub in_wishlist: bool,
}
