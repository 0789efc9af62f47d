//! Product catalog types and query normalization.
//!
//! The storefront accepts catalog filters as loosely-typed query strings.
//! [`ProductQuery`] is that raw shape; [`ProductFilter`] is the normalized
//! form the database layer consumes. Normalization rules:
//!
//! - blank strings are treated exactly like missing keys
//! - malformed numbers are ignored, never an error
//! - `minPrice > maxPrice` swaps the bounds
//! - `page` defaults to 1, `limit` defaults to [`DEFAULT_LIMIT`] and is
//!   clamped to `1..=MAX_LIMIT`
//! - unknown sort keys and orders fall back to `createdAt desc`

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Page size used when the caller gives none.
pub const DEFAULT_LIMIT: u32 = 12;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// Largest number of quick-search suggestions.
pub const MAX_SUGGESTIONS: u32 = 10;

/// Shortest search term that produces suggestions.
pub const MIN_SUGGESTION_CHARS: usize = 2;

// =============================================================================
// Raw query
// =============================================================================

/// Catalog query exactly as received on the wire.
///
/// Every field is an optional string so a malformed value can be ignored
/// instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

impl ProductQuery {
    /// Drop blank values so they are never sent as literal filters.
    #[must_use]
    pub fn stripped(self) -> Self {
        Self {
            category: non_blank(self.category),
            subcategory: non_blank(self.subcategory),
            min_price: non_blank(self.min_price),
            max_price: non_blank(self.max_price),
            search: non_blank(self.search),
            brand: non_blank(self.brand),
            min_rating: non_blank(self.min_rating),
            sort_by: non_blank(self.sort_by),
            sort_order: non_blank(self.sort_order),
            page: non_blank(self.page),
            limit: non_blank(self.limit),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Sorting
// =============================================================================

/// Sortable product attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    CreatedAt,
    Price,
    Rating,
    Name,
    Popularity,
}

impl SortKey {
    /// Wire name, as accepted in `sortBy`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::Price => "price",
            Self::Rating => "rating",
            Self::Name => "name",
            Self::Popularity => "popularity",
        }
    }

    /// Column the key sorts on.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Price => "price",
            Self::Rating => "rating_average",
            Self::Name => "lower(name)",
            Self::Popularity => "sales_count",
        }
    }
}

impl FromStr for SortKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "createdat" | "created_at" | "newest" => Ok(Self::CreatedAt),
            "price" => Ok(Self::Price),
            "rating" => Ok(Self::Rating),
            "name" => Ok(Self::Name),
            "popularity" | "popular" => Ok(Self::Popularity),
            _ => Err(()),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// SQL keyword for the direction.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(Self::Asc),
            "desc" | "descending" | "-1" => Ok(Self::Desc),
            _ => Err(()),
        }
    }
}

// =============================================================================
// Normalized filter
// =============================================================================

/// Normalized catalog filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_rating: Option<f64>,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            category: None,
            subcategory: None,
            brand: None,
            search: None,
            min_price: None,
            max_price: None,
            min_rating: None,
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ProductFilter {
    /// Normalize a raw query.
    #[must_use]
    pub fn from_query(query: &ProductQuery) -> Self {
        let query = query.clone().stripped();

        let mut min_price = query.min_price.as_deref().and_then(parse_price);
        let mut max_price = query.max_price.as_deref().and_then(parse_price);
        if let (Some(min), Some(max)) = (min_price, max_price)
            && min > max
        {
            min_price = Some(max);
            max_price = Some(min);
        }

        let min_rating = query
            .min_rating
            .as_deref()
            .and_then(|r| r.parse::<f64>().ok())
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(0.0, 5.0));

        let page = query
            .page
            .as_deref()
            .and_then(|p| p.parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);

        let limit = query
            .limit
            .as_deref()
            .and_then(|l| l.parse::<u32>().ok())
            .map_or(DEFAULT_LIMIT, |l| l.clamp(1, MAX_LIMIT));

        Self {
            category: query.category,
            subcategory: query.subcategory,
            brand: query.brand,
            search: query.search,
            min_price,
            max_price,
            min_rating,
            sort_by: query
                .sort_by
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            sort_order: query
                .sort_order
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            page,
            limit,
        }
    }

    /// Rows to skip for the requested page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Render back to a query, omitting everything left at its default.
    #[must_use]
    pub fn to_query(&self) -> ProductQuery {
        ProductQuery {
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
            min_price: self.min_price.map(|p| p.to_string()),
            max_price: self.max_price.map(|p| p.to_string()),
            search: self.search.clone(),
            brand: self.brand.clone(),
            min_rating: self.min_rating.map(|r| r.to_string()),
            sort_by: (self.sort_by != SortKey::default()).then(|| self.sort_by.as_str().to_owned()),
            sort_order: (self.sort_order != SortOrder::default())
                .then(|| self.sort_order.as_str().to_owned()),
            page: (self.page != 1).then(|| self.page.to_string()),
            limit: (self.limit != DEFAULT_LIMIT).then(|| self.limit.to_string()),
        }
    }
}

fn parse_price(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .ok()
        .filter(|p| !p.is_sign_negative())
}

// =============================================================================
// Pagination
// =============================================================================

/// Pagination metadata returned with every product page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub total_products: u64,
}

impl Pagination {
    /// Compute metadata for `current_page` of `total` rows split by `limit`.
    #[must_use]
    pub fn new(current_page: u32, limit: u32, total: u64) -> Self {
        let limit = u64::from(limit.max(1));
        let total_pages = u32::try_from(total.div_ceil(limit)).unwrap_or(u32::MAX);
        Self {
            current_page,
            total_pages,
            has_next: current_page < total_pages,
            has_prev: current_page > 1,
            total_products: total,
        }
    }
}

// =============================================================================
// Products
// =============================================================================

/// Rating aggregate for a product.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rating {
    pub average: f64,
    pub count: i32,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<Decimal>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub stock_quantity: i32,
    pub images: Vec<String>,
    pub rating: Rating,
    pub sales_count: i32,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// First image, used as the thumbnail.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    #[must_use]
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            image: self.primary_image().map(str::to_owned),
            brand: self.brand.clone(),
            rating: self.rating.average,
            in_stock: self.in_stock(),
        }
    }
}

/// Compact product shape for suggestions and wishlist items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    pub rating: f64,
    pub in_stock: bool,
}

/// One page of catalog results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

/// A category with its product count and subcategories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub name: String,
    pub count: i64,
    pub subcategories: Vec<SubcategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryCount {
    pub name: String,
    pub count: i64,
}

/// Fold `(category, subcategory, count)` rows into a sorted category tree.
#[must_use]
pub fn build_category_tree(rows: Vec<(String, Option<String>, i64)>) -> Vec<CategoryNode> {
    let mut tree: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
    let mut totals: BTreeMap<String, i64> = BTreeMap::new();

    for (category, subcategory, count) in rows {
        *totals.entry(category.clone()).or_default() += count;
        let subs = tree.entry(category).or_default();
        if let Some(sub) = subcategory.filter(|s| !s.trim().is_empty()) {
            *subs.entry(sub).or_default() += count;
        }
    }

    tree.into_iter()
        .map(|(name, subs)| CategoryNode {
            count: totals.get(&name).copied().unwrap_or_default(),
            name,
            subcategories: subs
                .into_iter()
                .map(|(name, count)| SubcategoryCount { name, count })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> ProductQuery {
        let json: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), serde_json::Value::String((*v).to_owned())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(json)).unwrap()
    }

    #[test]
    fn test_blank_values_equal_missing_keys() {
        let with_blanks = query(&[
            ("category", ""),
            ("subcategory", "  "),
            ("minPrice", ""),
            ("maxPrice", ""),
            ("search", ""),
            ("brand", ""),
            ("minRating", ""),
            ("sortBy", ""),
            ("sortOrder", ""),
            ("page", ""),
            ("limit", ""),
        ]);

        assert_eq!(
            ProductFilter::from_query(&with_blanks),
            ProductFilter::from_query(&ProductQuery::default())
        );
        assert_eq!(with_blanks.stripped(), ProductQuery::default());
    }

    #[test]
    fn test_blank_values_mixed_with_real_ones() {
        let a = query(&[("category", "Pompes"), ("brand", ""), ("page", "2")]);
        let b = query(&[("category", "Pompes"), ("page", "2")]);
        assert_eq!(ProductFilter::from_query(&a), ProductFilter::from_query(&b));
    }

    #[test]
    fn test_malformed_numbers_are_ignored() {
        let filter = ProductFilter::from_query(&query(&[
            ("minPrice", "abc"),
            ("maxPrice", "-5"),
            ("minRating", "NaN"),
            ("page", "-2"),
            ("limit", "lots"),
        ]));

        assert_eq!(filter.min_price, None);
        assert_eq!(filter.max_price, None);
        assert_eq!(filter.min_rating, None);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_price_bounds_are_swapped_when_inverted() {
        let filter =
            ProductFilter::from_query(&query(&[("minPrice", "500"), ("maxPrice", "100.5")]));
        assert_eq!(filter.min_price, Some(Decimal::new(1005, 1)));
        assert_eq!(filter.max_price, Some(Decimal::from(500)));
    }

    #[test]
    fn test_limit_is_clamped() {
        let filter = ProductFilter::from_query(&query(&[("limit", "1000")]));
        assert_eq!(filter.limit, MAX_LIMIT);

        let filter = ProductFilter::from_query(&query(&[("limit", "0")]));
        assert_eq!(filter.limit, 1);
    }

    #[test]
    fn test_min_rating_is_clamped() {
        let filter = ProductFilter::from_query(&query(&[("minRating", "9")]));
        assert_eq!(filter.min_rating, Some(5.0));
    }

    #[test]
    fn test_sort_parsing() {
        let filter = ProductFilter::from_query(&query(&[
            ("sortBy", "popularity"),
            ("sortOrder", "ASC"),
        ]));
        assert_eq!(filter.sort_by, SortKey::Popularity);
        assert_eq!(filter.sort_order, SortOrder::Asc);

        let fallback =
            ProductFilter::from_query(&query(&[("sortBy", "random"), ("sortOrder", "up")]));
        assert_eq!(fallback.sort_by, SortKey::CreatedAt);
        assert_eq!(fallback.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_offset() {
        let filter = ProductFilter::from_query(&query(&[("page", "3"), ("limit", "20")]));
        assert_eq!(filter.offset(), 40);
        assert_eq!(ProductFilter::default().offset(), 0);
    }

    #[test]
    fn test_to_query_omits_defaults() {
        let filter = ProductFilter {
            category: Some("Filtration".to_owned()),
            sort_by: SortKey::Price,
            ..ProductFilter::default()
        };
        let q = filter.to_query();
        assert_eq!(q.category.as_deref(), Some("Filtration"));
        assert_eq!(q.sort_by.as_deref(), Some("price"));
        assert_eq!(q.page, None);
        assert_eq!(q.limit, None);
        assert_eq!(ProductFilter::from_query(&q), filter);
    }

    #[test]
    fn test_pagination_flags_are_consistent() {
        for total in [0_u64, 1, 11, 12, 13, 99, 100, 250] {
            for limit in [1_u32, 5, 12, 100] {
                let pages = u32::try_from(total.div_ceil(u64::from(limit))).unwrap();
                for current in 1..=pages + 1 {
                    let p = Pagination::new(current, limit, total);
                    assert_eq!(p.total_pages, pages);
                    assert_eq!(p.has_next, current < p.total_pages);
                    assert_eq!(p.has_prev, current > 1);
                    assert_eq!(p.total_products, total);
                }
            }
        }
    }

    #[test]
    fn test_pagination_empty_catalog() {
        let p = Pagination::new(1, 12, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_prev);
    }

    #[test]
    fn test_pagination_wire_names() {
        let json = serde_json::to_value(Pagination::new(2, 10, 35)).unwrap();
        assert_eq!(json["currentPage"], 2);
        assert_eq!(json["totalPages"], 4);
        assert_eq!(json["hasNext"], true);
        assert_eq!(json["hasPrev"], true);
        assert_eq!(json["totalProducts"], 35);
    }

    #[test]
    fn test_build_category_tree() {
        let tree = build_category_tree(vec![
            ("Pompes".to_owned(), Some("Centrifuges".to_owned()), 4),
            ("Filtration".to_owned(), None, 2),
            ("Pompes".to_owned(), Some("Doseuses".to_owned()), 3),
            ("Filtration".to_owned(), Some("Sable".to_owned()), 5),
        ]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "Filtration");
        assert_eq!(tree[0].count, 7);
        assert_eq!(tree[0].subcategories.len(), 1);
        assert_eq!(tree[1].name, "Pompes");
        assert_eq!(tree[1].count, 7);
        assert_eq!(tree[1].subcategories[0].name, "Centrifuges");
    }
}
