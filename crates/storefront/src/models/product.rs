//! Product catalog models: products, color variants and size variants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stitchworks_core::{ColorId, ProductId, ShirtSize, SizeVariantId};

/// A shirt product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Price shown in listings; each size variant carries its own price.
    pub base_price_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A color variant of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductColor {
    pub id: ColorId,
    pub product_id: ProductId,
    pub name: String,
    /// `#RRGGBB`
    pub hex_code: String,
    pub front_image_url: Option<String>,
    pub back_image_url: Option<String>,
}

/// A size variant of a product, with its own price and stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeVariant {
    pub id: SizeVariantId,
    pub product_id: ProductId,
    pub size: ShirtSize,
    pub price_cents: i64,
    pub stock: i32,
}

/// A product with all of its variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub colors: Vec<ProductColor>,
    pub sizes: Vec<SizeVariant>,
}

impl ProductDetail {
    /// Find a color belonging to this product.
    #[must_use]
    pub fn color(&self, id: ColorId) -> Option<&ProductColor> {
        self.colors.iter().find(|c| c.id == id)
    }

    /// Find the variant for a size.
    #[must_use]
    pub fn size(&self, size: ShirtSize) -> Option<&SizeVariant> {
        self.sizes.iter().find(|s| s.size == size)
    }
}

/// Listing filter.
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub include_inactive: bool,
    pub limit: i64,
    pub offset: i64,
}

/// Create/update payload for a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub base_price_cents: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Validate field contents.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("product name is required".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("product category is required".to_string());
        }
        if self.base_price_cents < 0 {
            return Err("price cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Create/update payload for a color variant.
#[derive(Debug, Clone, Deserialize)]
pub struct ColorInput {
    pub name: String,
    pub hex_code: String,
    pub front_image_url: Option<String>,
    pub back_image_url: Option<String>,
}

impl ColorInput {
    /// Validate field contents.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("color name is required".to_string());
        }
        let hex = self.hex_code.strip_prefix('#').unwrap_or("");
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid hex color: {}", self.hex_code));
        }
        Ok(())
    }
}

/// Create/update payload for a size variant.
#[derive(Debug, Clone, Deserialize)]
pub struct SizeVariantInput {
    pub size: ShirtSize,
    pub price_cents: i64,
    pub stock: i32,
}

impl SizeVariantInput {
    /// Validate field contents.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.price_cents <= 0 {
            return Err("size price must be positive".to_string());
        }
        if self.stock < 0 {
            return Err("stock cannot be negative".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(hex: &str) -> ColorInput {
        ColorInput {
            name: "Heather Grey".to_string(),
            hex_code: hex.to_string(),
            front_image_url: None,
            back_image_url: None,
        }
    }

    #[test]
    fn test_color_hex_validation() {
        assert!(color("#A1B2C3").validate().is_ok());
        assert!(color("A1B2C3").validate().is_err());
        assert!(color("#GGGGGG").validate().is_err());
        assert!(color("#FFF").validate().is_err());
    }

    #[test]
    fn test_size_variant_validation() {
        let ok = SizeVariantInput {
            size: ShirtSize::M,
            price_cents: 2200,
            stock: 0,
        };
        assert!(ok.validate().is_ok());

        let free = SizeVariantInput {
            price_cents: 0,
            ..ok.clone()
        };
        assert!(free.validate().is_err());

        let negative = SizeVariantInput { stock: -1, ..ok };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_product_input_defaults_active() {
        let input: ProductInput = serde_json::from_str(
            r#"{"name": "Classic Tee", "category": "t-shirts", "base_price_cents": 1800}"#,
        )
        .unwrap_or_else(|e| panic!("valid input: {e}"));
        assert!(input.is_active);
        assert!(input.validate().is_ok());
    }
}
