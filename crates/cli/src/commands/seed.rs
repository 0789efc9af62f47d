//! Seed the catalog from a YAML file.
//!
//! Products are upserted by name (case-insensitive), so re-running the same
//! file updates prices and stock instead of duplicating products.
//!
//! # Usage
//!
//! ```bash
//! stes-cli seed products crates/cli/data/products.yaml
//! ```
//!
//! # File format
//!
//! ```yaml
//! products:
//!   - name: Pompe Hayward Max-Flo 1 CV
//!     description: Pompe auto-amorçante pour piscines jusqu'à 80 m³.
//!     price: "1290.000"
//!     category: Pompes
//!     brand: Hayward
//!     stock: 8
//!     featured: true
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use stes_storefront::db::products::NewProduct;
use stes_storefront::db::{ProductRepository, RepositoryError};

use super::{ConnectError, connect};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Top-level seed file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SeedRating {
    pub average: f64,
    pub count: i32,
}

/// One product as written in the seed file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub rating: SeedRating,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl SeedProduct {
    /// Problems with this entry, prefixed by its position in the file.
    fn problems(&self, index: usize) -> Vec<String> {
        let label = if self.name.trim().is_empty() {
            format!("product #{}", index + 1)
        } else {
            format!("product #{} ({})", index + 1, self.name.trim())
        };

        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push(format!("{label}: name is required"));
        }
        if self.category.trim().is_empty() {
            problems.push(format!("{label}: category is required"));
        }
        if self.price <= Decimal::ZERO {
            problems.push(format!("{label}: price must be positive"));
        }
        if self.compare_at_price.is_some_and(|p| p <= self.price) {
            problems.push(format!("{label}: compareAtPrice must exceed price"));
        }
        if self.stock < 0 {
            problems.push(format!("{label}: stock cannot be negative"));
        }
        if !(0.0..=5.0).contains(&self.rating.average) || self.rating.count < 0 {
            problems.push(format!("{label}: rating must be 0-5 with a non-negative count"));
        }
        problems
    }

    fn into_new_product(self) -> NewProduct {
        NewProduct {
            name: self.name.trim().to_owned(),
            description: self.description,
            price: self.price,
            compare_at_price: self.compare_at_price,
            category: self.category.trim().to_owned(),
            subcategory: self.subcategory,
            brand: self.brand,
            stock_quantity: self.stock,
            images: self.images,
            rating_average: self.rating.average,
            rating_count: self.rating.count,
            is_featured: self.featured,
            is_active: self.active,
        }
    }
}

/// Every problem in the file, including names repeated (case-insensitive).
#[must_use]
pub fn validate(catalog: &CatalogFile) -> Vec<String> {
    let mut problems: Vec<String> = catalog
        .products
        .iter()
        .enumerate()
        .flat_map(|(index, product)| product.problems(index))
        .collect();

    let mut seen = std::collections::HashSet::new();
    for product in &catalog.products {
        let key = product.name.trim().to_lowercase();
        if !key.is_empty() && !seen.insert(key) {
            problems.push(format!("duplicate product name: {}", product.name.trim()));
        }
    }
    problems
}

/// Upsert every product in `file_path`.
///
/// The whole file is validated before connecting, so a bad file writes
/// nothing.
///
/// # Errors
///
/// Returns an error if the file is missing or invalid, or a database write
/// fails.
pub async fn products(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: CatalogFile = serde_yaml::from_str(&content)?;
    info!(products = catalog.products.len(), "Parsed catalog");

    let problems = validate(&catalog);
    if !problems.is_empty() {
        error!("Catalog validation failed:");
        for problem in &problems {
            error!("  - {problem}");
        }
        return Err(SeedError::Invalid(problems.len()));
    }

    let pool = connect().await?;
    let repository = ProductRepository::new(&pool);

    let mut upserted = 0_usize;
    for product in catalog.products {
        let name = product.name.clone();
        let id = repository.upsert(&product.into_new_product()).await?;
        tracing::debug!(product_id = %id, name = %name, "Upserted product");
        upserted += 1;
    }

    info!("Seeding complete!");
    info!("  Products upserted: {upserted}");
    Ok(())
}
