//! Shopping cart models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stitchworks_core::{
    CartId, CartItemId, ColorId, CurrencyCode, DesignId, ProductId, SizeQuantities, UserId,
};

use super::order::{OrderLine, ShippingAddress};

/// A customer's cart. Each user has at most one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    /// Payment intent created by the last checkout attempt.
    pub payment_intent_id: Option<String>,
    pub checkout_snapshot: Option<CheckoutSnapshot>,
    pub updated_at: DateTime<Utc>,
}

/// One line in a cart: a product in one color, optionally with a design,
/// in several sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub color_id: ColorId,
    pub design_id: Option<DesignId>,
    pub quantities: SizeQuantities,
    pub created_at: DateTime<Utc>,
}

/// Payload for adding a line to the cart.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub color_id: ColorId,
    pub design_id: Option<DesignId>,
    pub quantities: SizeQuantities,
}

/// What the customer is paying for, stored on the cart next to the payment
/// intent and turned into an order once the payment succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSnapshot {
    pub email: String,
    pub shipping_address: Option<ShippingAddress>,
    pub lines: Vec<OrderLine>,
    /// The cart line each entry of `lines` was priced from.
    #[serde(default)]
    pub cart_item_ids: Vec<CartItemId>,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub currency: CurrencyCode,
}

impl CheckoutSnapshot {
    /// Quantities ordered from each cart line.
    ///
    /// `None` when the snapshot does not record its cart lines, in which
    /// case the whole cart was ordered.
    #[must_use]
    pub fn ordered_items(&self) -> Option<Vec<(CartItemId, SizeQuantities)>> {
        if self.cart_item_ids.len() != self.lines.len() {
            return None;
        }
        Some(
            self.cart_item_ids
                .iter()
                .zip(&self.lines)
                .map(|(id, line)| (*id, line.sizes.iter().map(|s| (s.size, s.quantity)).collect()))
                .collect(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stitchworks_core::ShirtSize;

    use super::*;
    use crate::models::OrderLineSize;

    fn line(sizes: &[(ShirtSize, u32)]) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(1),
            product_name: "Classic Tee".to_string(),
            color_id: ColorId::new(10),
            color_name: "Black".to_string(),
            design_id: None,
            sizes: sizes
                .iter()
                .map(|&(size, quantity)| OrderLineSize {
                    size,
                    quantity,
                    unit_price_cents: 2000,
                })
                .collect(),
            units: sizes.iter().map(|(_, q)| q).sum(),
            line_total_cents: 0,
        }
    }

    fn snapshot(lines: Vec<OrderLine>, ids: &[i32]) -> CheckoutSnapshot {
        CheckoutSnapshot {
            email: "sam@example.com".to_string(),
            shipping_address: None,
            lines,
            cart_item_ids: ids.iter().copied().map(CartItemId::new).collect(),
            subtotal_cents: 0,
            total_cents: 0,
            currency: CurrencyCode::Usd,
        }
    }

    #[test]
    fn test_ordered_items_pairs_lines_with_cart_items() {
        let s = snapshot(
            vec![line(&[(ShirtSize::M, 2)]), line(&[(ShirtSize::S, 1), (ShirtSize::L, 3)])],
            &[4, 9],
        );
        let items = s.ordered_items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, CartItemId::new(4));
        assert_eq!(items[0].1.get(ShirtSize::M), 2);
        assert_eq!(items[1].0, CartItemId::new(9));
        assert_eq!(items[1].1.total_units(), 4);
    }

    #[test]
    fn test_topped_up_line_keeps_the_difference() {
        let s = snapshot(vec![line(&[(ShirtSize::M, 2)])], &[4]);
        let (_, ordered) = s.ordered_items().unwrap().remove(0);

        let mut current: SizeQuantities = [(ShirtSize::M, 5)].into_iter().collect();
        current.subtract(&ordered);
        assert_eq!(current.get(ShirtSize::M), 3);
    }

    #[test]
    fn test_snapshot_without_cart_lines_orders_everything() {
        let json = serde_json::json!({
            "email": "sam@example.com",
            "shipping_address": null,
            "lines": [line(&[(ShirtSize::M, 1)])],
            "subtotal_cents": 2000,
            "total_cents": 2000,
            "currency": "usd"
        });
        let s: CheckoutSnapshot = serde_json::from_value(json).unwrap();
        assert!(s.ordered_items().is_none());
    }
}
