//! Seed an empty catalog with products and published design templates.
//!
//! The bundled `seed/catalog.yaml` is used unless `--file` points elsewhere.
//! Seeding is skipped when the catalog already has products, so running it
//! twice is harmless.

use std::path::Path;

use serde::Deserialize;
use stitchworks_core::UserId;
use stitchworks_storefront::db::{self, DesignTemplateRepository, ProductRepository, RepositoryError};
use stitchworks_storefront::models::{
    ColorInput, DesignTemplateInput, ProductInput, SizeVariantInput,
};
use thiserror::Error;
use tracing::info;

use super::migrate::{self, MigrationError};

const BUNDLED_CATALOG: &str = include_str!("../../seed/catalog.yaml");

/// Author recorded on seeded templates.
const SEED_AUTHOR: &str = "seed";

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Setup(#[from] MigrationError),

    #[error("Failed to read {0}: {1}")]
    Read(String, std::io::Error),

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid entry {0}: {1}")]
    Invalid(String, String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Top-level shape of a seed file.
#[derive(Debug, Deserialize)]
struct SeedCatalog {
    #[serde(default)]
    products: Vec<SeedProduct>,
    #[serde(default)]
    templates: Vec<DesignTemplateInput>,
}

#[derive(Debug, Deserialize)]
struct SeedProduct {
    #[serde(flatten)]
    product: ProductInput,
    #[serde(default)]
    colors: Vec<ColorInput>,
    #[serde(default)]
    sizes: Vec<SizeVariantInput>,
}

impl SeedCatalog {
    /// Check every entry before anything touches the database.
    fn validate(&self) -> Result<(), SeedError> {
        for seed in &self.products {
            let name = seed.product.name.clone();
            let invalid = |e: String| SeedError::Invalid(name.clone(), e);

            seed.product.validate().map_err(invalid)?;
            for color in &seed.colors {
                color.validate().map_err(invalid)?;
            }
            for size in &seed.sizes {
                size.validate().map_err(invalid)?;
            }
        }
        for template in &self.templates {
            template
                .validate()
                .map_err(|e| SeedError::Invalid(template.name.clone(), e))?;
        }
        Ok(())
    }
}

fn parse(content: &str) -> Result<SeedCatalog, SeedError> {
    let catalog: SeedCatalog = serde_yaml::from_str(content)?;
    catalog.validate()?;
    Ok(catalog)
}

/// Seed the catalog.
///
/// # Errors
///
/// Returns `SeedError` if the file cannot be read or fails validation, or if
/// a database write fails.
pub async fn catalog(file: Option<&Path>) -> Result<(), SeedError> {
    let content = match file {
        Some(path) => {
            info!(path = %path.display(), "Loading catalog from file");
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| SeedError::Read(path.display().to_string(), e))?
        }
        None => BUNDLED_CATALOG.to_owned(),
    };

    // Validate before connecting so a bad file never half-seeds.
    let seed = parse(&content)?;
    info!(
        products = seed.products.len(),
        templates = seed.templates.len(),
        "Parsed seed catalog"
    );

    let pool = db::create_pool(&migrate::database_url()?).await?;
    let products = ProductRepository::new(&pool);

    if !products.is_empty().await? {
        info!("Catalog already has products, skipping seed");
        return Ok(());
    }

    for entry in &seed.products {
        let product = products.create(&entry.product).await?;
        for color in &entry.colors {
            products.add_color(product.id, color).await?;
        }
        for size in &entry.sizes {
            products.add_size(product.id, size).await?;
        }
        info!(product_id = %product.id, name = %product.name, "Seeded product");
    }

    let templates = DesignTemplateRepository::new(&pool);
    let author = UserId::new(SEED_AUTHOR);
    for template in &seed.templates {
        let created = templates.insert(template, &author, true).await?;
        info!(template_id = %created.id, name = %created.name, "Seeded template");
    }

    info!("Seeding complete!");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_is_valid() {
        let seed = parse(BUNDLED_CATALOG).unwrap();
        assert!(!seed.products.is_empty());
        assert!(!seed.templates.is_empty());
        assert!(seed.products.iter().all(|p| !p.sizes.is_empty()));
    }

    #[test]
    fn test_invalid_entry_is_rejected() {
        let yaml = "
products:
  - name: Broken Tee
    category: t-shirts
    base_price_cents: 2000
    sizes:
      - size: M
        price_cents: 0
        stock: 5
";
        assert!(matches!(parse(yaml), Err(SeedError::Invalid(name, _)) if name == "Broken Tee"));
    }
}
