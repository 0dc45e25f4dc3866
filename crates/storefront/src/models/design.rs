//! Saved customer designs and staff-curated design templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stitchworks_core::{ColorId, DesignId, DesignTemplateId, ProductId, UserId};

/// Upper bound on elements in one design, to keep documents reasonable.
pub const MAX_DESIGN_ELEMENTS: usize = 200;

/// A customer's saved design: a product, a color and a list of canvas
/// elements (text, images, shapes) positioned by the web client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    pub id: DesignId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub color_id: ColorId,
    pub template_id: Option<DesignTemplateId>,
    pub name: String,
    pub elements: serde_json::Value,
    pub preview_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a design.
#[derive(Debug, Clone, Deserialize)]
pub struct DesignInput {
    pub product_id: ProductId,
    pub color_id: ColorId,
    pub template_id: Option<DesignTemplateId>,
    pub name: String,
    #[serde(default = "empty_elements")]
    pub elements: serde_json::Value,
    pub preview_url: Option<String>,
}

fn empty_elements() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

/// Elements must be a JSON array of objects.
fn validate_elements(elements: &serde_json::Value) -> Result<(), String> {
    let Some(items) = elements.as_array() else {
        return Err("design elements must be an array".to_string());
    };
    if items.len() > MAX_DESIGN_ELEMENTS {
        return Err(format!(
            "a design can have at most {MAX_DESIGN_ELEMENTS} elements"
        ));
    }
    if items.iter().any(|item| !item.is_object()) {
        return Err("each design element must be an object".to_string());
    }
    Ok(())
}

impl DesignInput {
    /// Validate field contents.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("design name is required".to_string());
        }
        validate_elements(&self.elements)
    }
}

/// A reusable starting point for designs, managed by designers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignTemplate {
    pub id: DesignTemplateId,
    pub name: String,
    pub category: String,
    pub elements: serde_json::Value,
    pub preview_url: Option<String>,
    pub is_published: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a design template.
#[derive(Debug, Clone, Deserialize)]
pub struct DesignTemplateInput {
    pub name: String,
    pub category: String,
    #[serde(default = "empty_elements")]
    pub elements: serde_json::Value,
    pub preview_url: Option<String>,
}

impl DesignTemplateInput {
    /// Validate field contents.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("template name is required".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("template category is required".to_string());
        }
        validate_elements(&self.elements)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_design_input_defaults_to_empty_canvas() {
        let input: DesignInput =
            serde_json::from_value(json!({"product_id": 1, "color_id": 2, "name": "Team shirt"}))
                .unwrap();
        assert_eq!(input.elements, json!([]));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_design_elements_must_be_objects() {
        let mut input: DesignInput =
            serde_json::from_value(json!({"product_id": 1, "color_id": 2, "name": "x"})).unwrap();
        input.elements = json!({"type": "text"});
        assert!(input.validate().is_err());
        input.elements = json!(["text"]);
        assert!(input.validate().is_err());
        input.elements = json!([{"type": "text", "value": "GO TEAM"}]);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_template_requires_category() {
        let input = DesignTemplateInput {
            name: "Retro sunset".to_string(),
            category: " ".to_string(),
            elements: json!([]),
            preview_url: None,
        };
        assert!(input.validate().is_err());
    }
}
