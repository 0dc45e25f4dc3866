//! Orders and the line snapshots they are created from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stitchworks_core::{
    ColorId, CurrencyCode, DesignId, Money, OrderId, OrderStatus, ProductId, ShirtSize, UserId,
};

/// One size of a priced line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineSize {
    pub size: ShirtSize,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

/// A priced cart line, frozen at checkout time.
///
/// Orders keep these snapshots so later catalog edits never change what a
/// customer paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub color_id: ColorId,
    pub color_name: String,
    pub design_id: Option<DesignId>,
    pub sizes: Vec<OrderLineSize>,
    pub units: u32,
    pub line_total_cents: i64,
}

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2
    pub country: String,
}

impl ShippingAddress {
    /// Validate field contents.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("name", &self.name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
        ] {
            if value.trim().is_empty() {
                return Err(format!("shipping address {field} is required"));
            }
        }
        if self.country.len() != 2 || !self.country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err("shipping country must be a two-letter code".to_string());
        }
        Ok(())
    }
}

/// A paid order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub email: String,
    pub payment_intent_id: String,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub refunded_cents: i64,
    pub currency: CurrencyCode,
    pub shipping_address: Option<ShippingAddress>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Order total.
    #[must_use]
    pub const fn total(&self) -> Money {
        Money::from_cents(self.total_cents, self.currency)
    }

    /// Amount that can still be refunded.
    #[must_use]
    pub const fn refundable_cents(&self) -> i64 {
        let remaining = self.total_cents - self.refunded_cents;
        if remaining < 0 { 0 } else { remaining }
    }

    /// Garments across every line.
    #[must_use]
    pub fn units(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.units))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Ada Lovelace".to_string(),
            line1: "12 Loom St".to_string(),
            line2: None,
            city: "Portland".to_string(),
            state: Some("OR".to_string()),
            postal_code: "97201".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn test_address_validation() {
        assert!(address().validate().is_ok());

        let mut missing_city = address();
        missing_city.city = String::new();
        assert!(missing_city.validate().is_err());

        let mut bad_country = address();
        bad_country.country = "USA".to_string();
        assert!(bad_country.validate().is_err());
    }

    #[test]
    fn test_refundable_never_negative() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": 1,
            "user_id": "user_1",
            "email": "a@example.com",
            "payment_intent_id": "pi_1",
            "status": "refunded",
            "items": [],
            "subtotal_cents": 2000,
            "total_cents": 2000,
            "refunded_cents": 2500,
            "currency": "usd",
            "shipping_address": null,
            "carrier": null,
            "tracking_number": null,
            "shipped_at": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(order.refundable_cents(), 0);
        assert_eq!(order.total().display(), "$20.00");
    }
}
