//! Carts and cart lines.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use stitchworks_core::{
    CartId, CartItemId, ColorId, DesignId, ProductId, SizeQuantities, UserId,
};

use super::RepositoryError;
use crate::models::{Cart, CartItem, CheckoutSnapshot, NewCartItem};

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i32,
    user_id: String,
    payment_intent_id: Option<String>,
    checkout_snapshot: Option<Json<CheckoutSnapshot>>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: CartId::new(row.id),
            user_id: UserId::new(row.user_id),
            payment_intent_id: row.payment_intent_id,
            checkout_snapshot: row.checkout_snapshot.map(|s| s.0),
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    cart_id: i32,
    product_id: i32,
    color_id: i32,
    design_id: Option<i32>,
    quantities: Json<SizeQuantities>,
    created_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: CartItemId::new(row.id),
            cart_id: CartId::new(row.cart_id),
            product_id: ProductId::new(row.product_id),
            color_id: ColorId::new(row.color_id),
            design_id: row.design_id.map(DesignId::new),
            quantities: row.quantities.0,
            created_at: row.created_at,
        }
    }
}

const CART_COLUMNS: &str = "id, user_id, payment_intent_id, checkout_snapshot, updated_at";
const ITEM_COLUMNS: &str = "id, cart_id, product_id, color_id, design_id, quantities, created_at";

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's cart, creating an empty one on first use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(&self, user_id: &UserId) -> Result<Cart, RepositoryError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "INSERT INTO storefront.cart (user_id) VALUES ($1)
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
             RETURNING {CART_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Lines in a cart, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM storefront.cart_item
             WHERE cart_id = $1 ORDER BY created_at, id"
        ))
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add a line, merging quantities into an existing line for the same
    /// product, color and design.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_item(
        &self,
        cart_id: CartId,
        item: &NewCartItem,
    ) -> Result<CartItem, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, CartItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM storefront.cart_item
             WHERE cart_id = $1 AND product_id = $2 AND color_id = $3
               AND design_id IS NOT DISTINCT FROM $4
             FOR UPDATE"
        ))
        .bind(cart_id)
        .bind(item.product_id)
        .bind(item.color_id)
        .bind(item.design_id)
        .fetch_optional(&mut *tx)
        .await?;

        let row = if let Some(existing) = existing {
            let mut quantities = existing.quantities.0;
            quantities.merge(&item.quantities);
            sqlx::query_as::<_, CartItemRow>(&format!(
                "UPDATE storefront.cart_item SET quantities = $2 WHERE id = $1
                 RETURNING {ITEM_COLUMNS}"
            ))
            .bind(existing.id)
            .bind(Json(&quantities))
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as::<_, CartItemRow>(&format!(
                "INSERT INTO storefront.cart_item (cart_id, product_id, color_id, design_id, quantities)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {ITEM_COLUMNS}"
            ))
            .bind(cart_id)
            .bind(item.product_id)
            .bind(item.color_id)
            .bind(item.design_id)
            .bind(Json(&item.quantities))
            .fetch_one(&mut *tx)
            .await?
        };

        touch(&mut tx, cart_id).await?;
        tx.commit().await?;

        Ok(row.into())
    }

    /// Get one line of a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM storefront.cart_item WHERE id = $1 AND cart_id = $2"
        ))
        .bind(item_id)
        .bind(cart_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Replace a line's quantities.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this cart.
    pub async fn update_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        quantities: &SizeQuantities,
    ) -> Result<CartItem, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            "UPDATE storefront.cart_item SET quantities = $3
             WHERE id = $1 AND cart_id = $2
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item_id)
        .bind(cart_id)
        .bind(Json(quantities))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        touch(&mut tx, cart_id).await?;
        tx.commit().await?;

        Ok(row.into())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this cart.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("DELETE FROM storefront.cart_item WHERE id = $1 AND cart_id = $2")
                .bind(item_id)
                .bind(cart_id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        touch(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove every line and forget any pending checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        clear_in_tx(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Record the payment intent and priced snapshot of a checkout attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another cart already holds the
    /// intent.
    pub async fn attach_checkout(
        &self,
        cart_id: CartId,
        payment_intent_id: &str,
        snapshot: &CheckoutSnapshot,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE storefront.cart
             SET payment_intent_id = $2, checkout_snapshot = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(cart_id)
        .bind(payment_intent_id)
        .bind(Json(snapshot))
        .execute(self.pool)
        .await
        .map_err(|e| super::map_unique_violation(e, "Payment intent already in use"))?;

        Ok(())
    }

    /// Find the cart holding a payment intent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM storefront.cart WHERE payment_intent_id = $1"
        ))
        .bind(payment_intent_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

/// Bump the cart's `updated_at`.
async fn touch(tx: &mut Transaction<'_, Postgres>, cart_id: CartId) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE storefront.cart SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Take an ordered checkout out of its cart inside an existing transaction.
///
/// Each ordered line loses the quantities that were paid for and is removed
/// once nothing is left. Lines added or topped up after checkout started
/// keep whatever the order did not cover.
pub(crate) async fn settle_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    cart_id: CartId,
    snapshot: &CheckoutSnapshot,
) -> Result<(), sqlx::Error> {
    let Some(ordered_items) = snapshot.ordered_items() else {
        return clear_in_tx(tx, cart_id).await;
    };

    for (item_id, ordered) in ordered_items {
        let current = sqlx::query_scalar::<_, Json<SizeQuantities>>(
            "SELECT quantities FROM storefront.cart_item
             WHERE id = $1 AND cart_id = $2
             FOR UPDATE",
        )
        .bind(item_id)
        .bind(cart_id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(Json(mut remaining)) = current else {
            continue;
        };
        remaining.subtract(&ordered);

        if remaining.is_empty() {
            sqlx::query("DELETE FROM storefront.cart_item WHERE id = $1")
                .bind(item_id)
                .execute(&mut **tx)
                .await?;
        } else {
            sqlx::query("UPDATE storefront.cart_item SET quantities = $2 WHERE id = $1")
                .bind(item_id)
                .bind(Json(&remaining))
                .execute(&mut **tx)
                .await?;
        }
    }

    forget_checkout(tx, cart_id).await
}

/// Empty a cart inside an existing transaction.
async fn clear_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    cart_id: CartId,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM storefront.cart_item WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut **tx)
        .await?;
    forget_checkout(tx, cart_id).await
}

async fn forget_checkout(
    tx: &mut Transaction<'_, Postgres>,
    cart_id: CartId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE storefront.cart
         SET payment_intent_id = NULL, checkout_snapshot = NULL, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(cart_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
