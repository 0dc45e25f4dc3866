//! Checkout: pricing carts, reconciling payment intents, turning paid
//! intents into orders.
//!
//! The pure functions at the top hold the rules; `start_checkout` and
//! `finalize_payment` orchestrate them against the database and the
//! payment provider.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use stitchworks_core::{
    CartItemId, CurrencyCode, Money, MoneyError, ProductId, ShirtSize, UserId,
};

use crate::db::{CartRepository, OrderRepository, ProductRepository};
use crate::error::AppError;
use crate::models::{
    AuthenticatedUser, CartItem, CheckoutSnapshot, Order, OrderLine, OrderLineSize,
    ProductDetail, ShippingAddress,
};
use crate::services::email::spawn_notification;
use crate::services::payments::{
    IntentMetadata, PaymentError, PaymentIntent, PaymentIntentStatus,
};
use crate::state::AppState;

/// Why a cart cannot be checked out.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Product {0} is no longer available")]
    UnknownProduct(ProductId),

    #[error("{product} is not available in the selected color")]
    UnknownColor { product: String },

    #[error("{product} is not available in size {size}")]
    UnknownSize { product: String, size: ShirtSize },

    #[error("Only {available} of {product} in size {size} left (requested {requested})")]
    OutOfStock {
        product: String,
        size: ShirtSize,
        requested: u32,
        available: u32,
    },

    #[error("Price calculation failed: {0}")]
    Money(#[from] MoneyError),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::OutOfStock { .. } => Self::Conflict(err.to_string()),
            CheckoutError::Money(_) => Self::Internal(err.to_string()),
            _ => Self::BadRequest(err.to_string()),
        }
    }
}

/// A priced cart line with the cart item it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub item_id: CartItemId,
    #[serde(flatten)]
    pub line: OrderLine,
}

/// A cart with prices resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub units: u32,
}

impl PricedCart {
    /// The lines without cart item ids, as stored on orders.
    #[must_use]
    pub fn order_lines(&self) -> Vec<OrderLine> {
        self.lines.iter().map(|l| l.line.clone()).collect()
    }
}

/// Price every cart line from the products' size variants.
///
/// `catalog` must contain every product the cart references; a missing or
/// archived product, a color from another product and a size the product
/// does not offer are all errors.
///
/// # Errors
///
/// Returns the first `CheckoutError` found.
pub fn price_cart(
    items: &[CartItem],
    catalog: &HashMap<ProductId, ProductDetail>,
    currency: CurrencyCode,
) -> Result<PricedCart, CheckoutError> {
    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        let detail = catalog
            .get(&item.product_id)
            .filter(|d| d.product.is_active)
            .ok_or(CheckoutError::UnknownProduct(item.product_id))?;
        let product = &detail.product.name;
        let color = detail
            .color(item.color_id)
            .ok_or_else(|| CheckoutError::UnknownColor {
                product: product.clone(),
            })?;

        let mut sizes = Vec::new();
        let mut line_total = Money::zero(currency);
        for (size, quantity) in item.quantities.iter() {
            let variant = detail
                .size(size)
                .ok_or_else(|| CheckoutError::UnknownSize {
                    product: product.clone(),
                    size,
                })?;
            let unit = Money::from_cents(variant.price_cents, currency);
            line_total = line_total.checked_add(unit.checked_mul(quantity)?)?;
            sizes.push(OrderLineSize {
                size,
                quantity,
                unit_price_cents: variant.price_cents,
            });
        }

        lines.push(PricedLine {
            item_id: item.id,
            line: OrderLine {
                product_id: item.product_id,
                product_name: product.clone(),
                color_id: color.id,
                color_name: color.name.clone(),
                design_id: item.design_id,
                sizes,
                units: item.quantities.total_units(),
                line_total_cents: line_total.cents(),
            },
        });
    }

    let subtotal = Money::sum(
        currency,
        lines
            .iter()
            .map(|l| Money::from_cents(l.line.line_total_cents, currency)),
    )?;
    let units = lines
        .iter()
        .fold(0_u32, |acc, l| acc.saturating_add(l.line.units));

    Ok(PricedCart {
        lines,
        subtotal,
        units,
    })
}

/// Stock per product and size, from loaded catalog details.
#[must_use]
pub fn stock_levels(
    catalog: &HashMap<ProductId, ProductDetail>,
) -> HashMap<(ProductId, ShirtSize), i32> {
    catalog
        .values()
        .flat_map(|detail| {
            detail
                .sizes
                .iter()
                .map(|s| ((s.product_id, s.size), s.stock))
        })
        .collect()
}

/// Check requested quantities against stock.
///
/// The same product in different colors draws from one stock count per
/// size, so requests are summed across lines first.
///
/// # Errors
///
/// Returns `CheckoutError::OutOfStock` for the first size that is short.
pub fn check_stock(
    lines: &[OrderLine],
    stock: &HashMap<(ProductId, ShirtSize), i32>,
) -> Result<(), CheckoutError> {
    let mut requested: Vec<((ProductId, ShirtSize), u32, &str)> = Vec::new();
    for line in lines {
        for size in &line.sizes {
            let key = (line.product_id, size.size);
            if let Some(entry) = requested.iter_mut().find(|(k, _, _)| *k == key) {
                entry.1 = entry.1.saturating_add(size.quantity);
            } else {
                requested.push((key, size.quantity, &line.product_name));
            }
        }
    }

    for ((product_id, size), quantity, product) in requested {
        let available = stock
            .get(&(product_id, size))
            .copied()
            .map_or(0, |s| u32::try_from(s).unwrap_or(0));
        if quantity > available {
            return Err(CheckoutError::OutOfStock {
                product: product.to_string(),
                size,
                requested: quantity,
                available,
            });
        }
    }
    Ok(())
}

/// What to do with the cart's existing payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentAction {
    /// Same amount and still payable.
    Reuse,
    /// Still payable but the cart total changed.
    UpdateAmount,
    /// No usable intent.
    CreateNew,
    /// The customer already paid or a payment is underway. Replacing the
    /// intent would orphan that payment.
    InFlight,
}

/// Decide whether an existing payment intent can serve a checkout of
/// `total`.
#[must_use]
pub fn reconcile_intent(existing: Option<&PaymentIntent>, total: Money) -> IntentAction {
    let Some(intent) = existing else {
        return IntentAction::CreateNew;
    };
    if intent.status.is_committed() {
        return IntentAction::InFlight;
    }
    if !intent.status.is_updatable()
        || !intent
            .currency
            .eq_ignore_ascii_case(total.currency().code())
    {
        return IntentAction::CreateNew;
    }
    if intent.amount == total.cents() {
        IntentAction::Reuse
    } else {
        IntentAction::UpdateAmount
    }
}

fn in_flight_message(status: PaymentIntentStatus) -> &'static str {
    if status == PaymentIntentStatus::Succeeded {
        "Payment for this cart already succeeded, confirm it to create the order"
    } else {
        "A payment for this cart is still being processed, try again shortly"
    }
}

/// What the web client needs to collect payment.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub payment_intent_id: String,
    pub client_secret: String,
    pub amount: Money,
    pub currency: CurrencyCode,
}

/// Price the user's cart and prepare a payment intent for it.
///
/// # Errors
///
/// - `BadRequest` for an empty cart, unavailable items or a missing email
/// - `Conflict` when stock is short or the cart's payment already went
///   through or is still processing
/// - provider and database errors otherwise
#[instrument(skip(state, user, shipping_address), fields(user_id = %user.id))]
pub async fn start_checkout(
    state: &AppState,
    user: &AuthenticatedUser,
    shipping_address: Option<ShippingAddress>,
) -> Result<CheckoutSession, AppError> {
    let email = user
        .email
        .clone()
        .ok_or_else(|| AppError::BadRequest("Add an email address to your account".to_string()))?;
    if let Some(address) = &shipping_address {
        address.validate().map_err(AppError::BadRequest)?;
    }

    let carts = CartRepository::new(state.pool());
    let cart = carts.get_or_create(&user.id).await?;
    let items = carts.items(cart.id).await?;
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart.into());
    }

    // Fresh reads: stock must not come from the cache.
    let product_ids: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
    let catalog = ProductRepository::new(state.pool())
        .details_for(&product_ids)
        .await?;

    let currency = state.currency();
    let priced = price_cart(&items, &catalog, currency)?;
    let lines = priced.order_lines();
    check_stock(&lines, &stock_levels(&catalog))?;
    let total = priced.subtotal;

    // Only an intent the provider no longer knows may be forgotten. Any other
    // lookup failure could hide a payment in flight.
    let existing = match &cart.payment_intent_id {
        Some(id) => match state.payments().retrieve_payment_intent(id).await {
            Ok(intent) => Some(intent),
            Err(PaymentError::Api { status: 404, .. }) => {
                warn!(payment_intent_id = %id, "Previous payment intent no longer exists");
                None
            }
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    let intent = match (reconcile_intent(existing.as_ref(), total), existing) {
        (IntentAction::InFlight, Some(intent)) => {
            return Err(AppError::Conflict(in_flight_message(intent.status).to_string()));
        }
        (IntentAction::Reuse, Some(intent)) => intent,
        (IntentAction::UpdateAmount, Some(intent)) => {
            state
                .payments()
                .update_payment_intent_amount(&intent.id, total.cents())
                .await?
        }
        (_, stale) => {
            // A replaced intent that could still be paid would charge twice.
            if let Some(old) = stale.filter(|i| i.status.is_updatable())
                && let Err(e) = state.payments().cancel_payment_intent(&old.id).await
            {
                warn!(payment_intent_id = %old.id, error = %e, "Could not cancel replaced payment intent");
            }
            let metadata = IntentMetadata {
                user_id: user.id.to_string(),
                cart_id: cart.id.to_string(),
                user_email: email.clone(),
            };
            state
                .payments()
                .create_payment_intent(total, &metadata)
                .await?
        }
    };

    let client_secret = intent.client_secret.clone().ok_or_else(|| {
        AppError::Internal(format!("payment intent {} has no client secret", intent.id))
    })?;

    let snapshot = CheckoutSnapshot {
        email,
        shipping_address,
        lines,
        cart_item_ids: priced.lines.iter().map(|l| l.item_id).collect(),
        subtotal_cents: total.cents(),
        total_cents: total.cents(),
        currency,
    };
    carts.attach_checkout(cart.id, &intent.id, &snapshot).await?;

    info!(
        payment_intent_id = %intent.id,
        amount = total.cents(),
        units = priced.units,
        "Checkout started"
    );

    Ok(CheckoutSession {
        payment_intent_id: intent.id,
        client_secret,
        amount: total,
        currency,
    })
}

/// Create the order for a succeeded payment intent.
///
/// Safe to call more than once and from both the confirm route and the
/// webhook: the order is created once and later calls return it.
/// `caller` restricts the lookup to one user's cart and orders.
///
/// # Errors
///
/// - `Conflict` if the payment has not succeeded or the paid amount does not
///   match the checkout
/// - `NotFound` if no cart or order belongs to the intent (or to `caller`)
#[instrument(skip(state, caller))]
pub async fn finalize_payment(
    state: &AppState,
    payment_intent_id: &str,
    caller: Option<&UserId>,
) -> Result<Order, AppError> {
    let owned_by_caller = |user_id: &UserId| caller.is_none_or(|c| c == user_id);
    let orders = OrderRepository::new(state.pool());

    if let Some(order) = orders.find_by_payment_intent(payment_intent_id).await? {
        return if owned_by_caller(&order.user_id) {
            Ok(order)
        } else {
            Err(AppError::NotFound("Order not found".to_string()))
        };
    }

    let intent = state
        .payments()
        .retrieve_payment_intent(payment_intent_id)
        .await?;
    if intent.status != PaymentIntentStatus::Succeeded {
        return Err(AppError::Conflict(format!(
            "Payment has not completed (status: {:?})",
            intent.status
        )));
    }

    let Some(cart) = CartRepository::new(state.pool())
        .find_by_payment_intent(payment_intent_id)
        .await?
    else {
        // Lost the race with a concurrent finalize.
        return match orders.find_by_payment_intent(payment_intent_id).await? {
            Some(order) if owned_by_caller(&order.user_id) => Ok(order),
            _ => Err(AppError::NotFound("No checkout for this payment".to_string())),
        };
    };

    if !owned_by_caller(&cart.user_id) {
        return Err(AppError::NotFound("No checkout for this payment".to_string()));
    }

    let snapshot = cart.checkout_snapshot.ok_or_else(|| {
        AppError::Internal(format!("cart {} has an intent but no snapshot", cart.id))
    })?;

    if intent.amount != snapshot.total_cents {
        error!(
            payment_intent_id,
            paid = intent.amount,
            expected = snapshot.total_cents,
            "Paid amount does not match checkout"
        );
        return Err(AppError::Conflict(
            "Paid amount does not match the checkout total".to_string(),
        ));
    }

    let (order, created) = orders
        .create_from_checkout(cart.id, &cart.user_id, payment_intent_id, &snapshot)
        .await?;

    if created {
        info!(order_id = %order.id, total = order.total_cents, "Order created");
        state.catalog().invalidate();
        let confirmation = order.clone();
        spawn_notification(state.email(), "order_confirmation", move |email| async move {
            email.send_order_confirmation(&confirmation).await
        });
    }

    Ok(order)
}
