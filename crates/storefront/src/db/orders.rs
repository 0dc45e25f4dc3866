//! Orders.
//!
//! Orders are only written once a payment has succeeded, from the checkout
//! snapshot stored on the cart. Creation is idempotent on the payment
//! intent so the confirm route and the webhook can race safely.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use stitchworks_core::{CartId, CurrencyCode, OrderId, OrderStatus, UserId};

use super::RepositoryError;
use super::carts::settle_in_tx;
use crate::models::{CheckoutSnapshot, Order, OrderLine, ShippingAddress};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: String,
    email: String,
    payment_intent_id: String,
    status: OrderStatus,
    items: Json<Vec<OrderLine>>,
    subtotal_cents: i64,
    total_cents: i64,
    refunded_cents: i64,
    currency: String,
    shipping_address: Option<Json<ShippingAddress>>,
    carrier: Option<String>,
    tracking_number: Option<String>,
    shipped_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let currency: CurrencyCode = row.currency.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            email: row.email,
            payment_intent_id: row.payment_intent_id,
            status: row.status,
            items: row.items.0,
            subtotal_cents: row.subtotal_cents,
            total_cents: row.total_cents,
            refunded_cents: row.refunded_cents,
            currency,
            shipping_address: row.shipping_address.map(|a| a.0),
            carrier: row.carrier,
            tracking_number: row.tracking_number,
            shipped_at: row.shipped_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// The subset of an order the dashboard aggregates over.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderStatsRow {
    pub status: OrderStatus,
    pub total_cents: i64,
    pub refunded_cents: i64,
    pub items: Json<Vec<OrderLine>>,
    pub created_at: DateTime<Utc>,
}

const ORDER_COLUMNS: &str = "id, user_id, email, payment_intent_id, status, items, \
                             subtotal_cents, total_cents, refunded_cents, currency, \
                             shipping_address, carrier, tracking_number, shipped_at, \
                             created_at, updated_at";

fn convert_all(rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
    rows.into_iter().map(Order::try_from).collect()
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn a paid checkout into an order.
    ///
    /// In one transaction: insert the order, decrement stock for every
    /// ordered size (never below zero) and take the ordered quantities out
    /// of the cart. If an order for
    /// this payment intent already exists, nothing is written and the
    /// existing order is returned with `false`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; the
    /// transaction is rolled back.
    pub async fn create_from_checkout(
        &self,
        cart_id: CartId,
        user_id: &UserId,
        payment_intent_id: &str,
        snapshot: &CheckoutSnapshot,
    ) -> Result<(Order, bool), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO storefront.customer_order
                (user_id, email, payment_intent_id, status, items,
                 subtotal_cents, total_cents, currency, shipping_address)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (payment_intent_id) DO NOTHING
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&snapshot.email)
        .bind(payment_intent_id)
        .bind(OrderStatus::Paid)
        .bind(Json(&snapshot.lines))
        .bind(snapshot.subtotal_cents)
        .bind(snapshot.total_cents)
        .bind(snapshot.currency.code())
        .bind(snapshot.shipping_address.as_ref().map(Json))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = inserted else {
            tx.rollback().await?;
            let existing = self
                .find_by_payment_intent(payment_intent_id)
                .await?
                .ok_or(RepositoryError::NotFound)?;
            return Ok((existing, false));
        };

        for line in &snapshot.lines {
            for size in &line.sizes {
                sqlx::query(
                    "UPDATE storefront.product_size
                     SET stock = GREATEST(stock - $3, 0)
                     WHERE product_id = $1 AND size = $2",
                )
                .bind(line.product_id)
                .bind(size.size)
                .bind(i32::try_from(size.quantity).unwrap_or(i32::MAX))
                .execute(&mut *tx)
                .await?;
            }
        }

        settle_in_tx(&mut tx, cart_id, snapshot).await?;
        tx.commit().await?;

        Ok((Order::try_from(row)?, true))
    }

    /// Find the order paid by a payment intent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE payment_intent_id = $1"
        ))
        .bind(payment_intent_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        convert_all(rows)
    }

    /// One of a user's orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user_id: &UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Any order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// All orders, optionally in one status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order
             WHERE ($1::storefront.order_status IS NULL OR status = $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        convert_all(rows)
    }

    /// Move an order from `from` to `to`.
    ///
    /// The update only applies while the order is still in `from`, so two
    /// staff members changing the same order cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order changed status in the
    /// meantime.
    pub async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE storefront.customer_order
             SET status = $3, updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("Order status changed, reload".to_string()))?;

        Order::try_from(row)
    }

    /// Mark an order shipped with carrier and tracking number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order changed status in the
    /// meantime.
    pub async fn mark_shipped(
        &self,
        id: OrderId,
        from: OrderStatus,
        carrier: &str,
        tracking_number: &str,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE storefront.customer_order
             SET status = 'shipped', carrier = $3, tracking_number = $4,
                 shipped_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(from)
        .bind(carrier)
        .bind(tracking_number)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("Order status changed, reload".to_string()))?;

        Order::try_from(row)
    }

    /// Cancel an order whose remaining balance was just refunded.
    ///
    /// Only applies while the order is still in `from`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order changed status in the
    /// meantime.
    pub async fn cancel_refunded(
        &self,
        id: OrderId,
        from: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE storefront.customer_order
             SET status = 'cancelled', refunded_cents = total_cents, updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(from)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("Order status changed, reload".to_string()))?;

        Order::try_from(row)
    }

    /// Add a refund made through staff tools.
    ///
    /// The order becomes `refunded` once the refunded amount reaches the
    /// total, unless it was cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the refund would exceed the
    /// order total.
    pub async fn record_refund(
        &self,
        id: OrderId,
        amount_cents: i64,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE storefront.customer_order
             SET refunded_cents = refunded_cents + $2,
                 status = CASE WHEN refunded_cents + $2 >= total_cents
                                    AND status <> 'cancelled'
                               THEN 'refunded'::storefront.order_status ELSE status END,
                 updated_at = NOW()
             WHERE id = $1 AND refunded_cents + $2 <= total_cents
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(amount_cents)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("Refund exceeds order total".to_string()))?;

        Order::try_from(row)
    }

    /// Sync the refunded total reported by the payment provider.
    ///
    /// The provider reports the cumulative refunded amount, so the stored
    /// value only ever grows to match it. Cancelled orders stay cancelled. Returns `None` when no order uses
    /// the intent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sync_refunded_total(
        &self,
        payment_intent_id: &str,
        amount_refunded_cents: i64,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE storefront.customer_order
             SET refunded_cents = LEAST(GREATEST(refunded_cents, $2), total_cents),
                 status = CASE WHEN GREATEST(refunded_cents, $2) >= total_cents
                                    AND status <> 'cancelled'
                               THEN 'refunded'::storefront.order_status ELSE status END,
                 updated_at = NOW()
             WHERE payment_intent_id = $1
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(payment_intent_id)
        .bind(amount_refunded_cents)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Every order, reduced to what the dashboard needs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats_rows(&self) -> Result<Vec<OrderStatsRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderStatsRow>(
            "SELECT status, total_cents, refunded_cents, items, created_at
             FROM storefront.customer_order",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
