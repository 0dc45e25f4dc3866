//! Dashboard aggregation.
//!
//! Everything here is a pure function over rows already loaded from the
//! database, so the numbers can be tested without one.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use stitchworks_core::{CurrencyCode, Money, MoneyError, OrderStatus, QuoteStatus, ShirtSize};

use crate::db::{InventoryRow, OrderStatsRow};

/// Products shown in the best-seller list.
const TOP_PRODUCTS: usize = 5;

/// Units sold of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSales {
    pub product_id: i32,
    pub product_name: String,
    pub units: u64,
}

/// Stock on hand for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInventory {
    pub product_id: i32,
    pub product_name: String,
    pub units: i64,
    pub value: Money,
}

/// A size variant running low.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockItem {
    pub product_id: i32,
    pub product_name: String,
    pub size: ShirtSize,
    pub stock: i32,
}

/// Staff dashboard numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Totals minus refunds, over orders that count as revenue.
    pub revenue: Money,
    pub revenue_month_to_date: Money,
    pub order_count: usize,
    pub orders_by_status: BTreeMap<String, usize>,
    pub average_order_value: Money,
    pub top_products: Vec<ProductSales>,
    pub inventory: Vec<ProductInventory>,
    pub inventory_units: i64,
    pub inventory_value: Money,
    pub low_stock: Vec<LowStockItem>,
    pub pending_quotes: i64,
}

/// Inputs to `compute_dashboard`.
pub struct DashboardInput<'a> {
    pub orders: &'a [OrderStatsRow],
    pub inventory: &'a [InventoryRow],
    pub quote_counts: &'a HashMap<QuoteStatus, i64>,
    pub currency: CurrencyCode,
    pub low_stock_threshold: i32,
    pub now: DateTime<Utc>,
}

/// Aggregate dashboard numbers.
///
/// # Errors
///
/// Returns `MoneyError::Overflow` if a total does not fit in 64 bits.
pub fn compute_dashboard(input: &DashboardInput<'_>) -> Result<DashboardStats, MoneyError> {
    let currency = input.currency;
    let cents = |c: i64| Money::from_cents(c, currency);

    let mut revenue = Money::zero(currency);
    let mut revenue_mtd = Money::zero(currency);
    let mut revenue_orders: i64 = 0;
    let mut orders_by_status: BTreeMap<String, usize> = OrderStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut sales: HashMap<i32, ProductSales> = HashMap::new();

    for order in input.orders {
        *orders_by_status
            .entry(order.status.as_str().to_string())
            .or_insert(0) += 1;

        if !order.status.counts_as_revenue() {
            continue;
        }
        let net = cents(order.total_cents).checked_sub(cents(order.refunded_cents))?;
        revenue = revenue.checked_add(net)?;
        revenue_orders += 1;
        if order.created_at.year() == input.now.year()
            && order.created_at.month() == input.now.month()
        {
            revenue_mtd = revenue_mtd.checked_add(net)?;
        }

        for line in &order.items.0 {
            let entry = sales
                .entry(line.product_id.as_i32())
                .or_insert_with(|| ProductSales {
                    product_id: line.product_id.as_i32(),
                    product_name: line.product_name.clone(),
                    units: 0,
                });
            entry.units += u64::from(line.units);
        }
    }

    let average_order_value = if revenue_orders == 0 {
        Money::zero(currency)
    } else {
        cents(revenue.cents() / revenue_orders)
    };

    let mut top_products: Vec<ProductSales> = sales.into_values().collect();
    top_products.sort_by(|a, b| {
        b.units
            .cmp(&a.units)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    top_products.truncate(TOP_PRODUCTS);

    let mut inventory: Vec<ProductInventory> = Vec::new();
    let mut low_stock = Vec::new();
    for row in input.inventory {
        let stock = row.stock.max(0);
        let value = cents(row.price_cents).checked_mul(u32::try_from(stock).unwrap_or(0))?;
        if let Some(entry) = inventory.iter_mut().find(|p| p.product_id == row.product_id) {
            entry.units += i64::from(stock);
            entry.value = entry.value.checked_add(value)?;
        } else {
            inventory.push(ProductInventory {
                product_id: row.product_id,
                product_name: row.product_name.clone(),
                units: i64::from(stock),
                value,
            });
        }
        if row.stock < input.low_stock_threshold {
            low_stock.push(LowStockItem {
                product_id: row.product_id,
                product_name: row.product_name.clone(),
                size: row.size,
                stock: row.stock,
            });
        }
    }
    low_stock.sort_by_key(|item| item.stock);

    let inventory_units = inventory.iter().map(|p| p.units).sum();
    let inventory_value = Money::sum(currency, inventory.iter().map(|p| p.value))?;

    let pending_quotes = input
        .quote_counts
        .iter()
        .filter(|(status, _)| status.awaiting_staff())
        .map(|(_, count)| count)
        .sum();

    Ok(DashboardStats {
        revenue,
        revenue_month_to_date: revenue_mtd,
        order_count: input.orders.len(),
        orders_by_status,
        average_order_value,
        top_products,
        inventory,
        inventory_units,
        inventory_value,
        low_stock,
        pending_quotes,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use sqlx::types::Json;
    use stitchworks_core::{ColorId, ProductId};

    use super::*;
    use crate::models::OrderLine;

    fn line(product: i32, name: &str, units: u32) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(product),
            product_name: name.to_string(),
            color_id: ColorId::new(1),
            color_name: "Black".to_string(),
            design_id: None,
            sizes: Vec::new(),
            units,
            line_total_cents: 0,
        }
    }

    fn order(
        status: OrderStatus,
        total: i64,
        refunded: i64,
        items: Vec<OrderLine>,
        created_at: DateTime<Utc>,
    ) -> OrderStatsRow {
        OrderStatsRow {
            status,
            total_cents: total,
            refunded_cents: refunded,
            items: Json(items),
            created_at,
        }
    }

    fn inventory(product: i32, name: &str, size: ShirtSize, price: i64, stock: i32) -> InventoryRow {
        InventoryRow {
            product_id: product,
            product_name: name.to_string(),
            size,
            price_cents: price,
            stock,
        }
    }

    #[test]
    fn test_dashboard_numbers() {
        let now = Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();
        let this_month = Utc.with_ymd_and_hms(2026, 5, 2, 9, 0, 0).unwrap();
        let last_month = Utc.with_ymd_and_hms(2026, 4, 28, 9, 0, 0).unwrap();

        let orders = vec![
            order(OrderStatus::Delivered, 5000, 0, vec![line(1, "Tee", 2)], last_month),
            order(OrderStatus::Paid, 3000, 1000, vec![line(2, "Hoodie", 1)], this_month),
            order(OrderStatus::Refunded, 9000, 9000, vec![line(1, "Tee", 9)], this_month),
            order(OrderStatus::Shipped, 4000, 0, vec![line(1, "Tee", 3)], this_month),
        ];
        let stock = vec![
            inventory(1, "Tee", ShirtSize::M, 2000, 12),
            inventory(1, "Tee", ShirtSize::L, 2000, 3),
            inventory(2, "Hoodie", ShirtSize::M, 4500, 0),
        ];
        let quotes = HashMap::from([
            (QuoteStatus::Pending, 2),
            (QuoteStatus::InReview, 1),
            (QuoteStatus::Quoted, 4),
        ]);

        let stats = compute_dashboard(&DashboardInput {
            orders: &orders,
            inventory: &stock,
            quote_counts: &quotes,
            currency: CurrencyCode::Usd,
            low_stock_threshold: 10,
            now,
        })
        .unwrap();

        // 5000 + (3000 - 1000) + 4000; refunded order excluded
        assert_eq!(stats.revenue.cents(), 11_000);
        assert_eq!(stats.revenue_month_to_date.cents(), 6_000);
        assert_eq!(stats.order_count, 4);
        assert_eq!(stats.orders_by_status["refunded"], 1);
        assert_eq!(stats.orders_by_status["cancelled"], 0);
        assert_eq!(stats.average_order_value.cents(), 3_666);

        assert_eq!(stats.top_products[0].product_name, "Tee");
        assert_eq!(stats.top_products[0].units, 5);
        assert_eq!(stats.top_products[1].units, 1);

        assert_eq!(stats.inventory_units, 15);
        assert_eq!(stats.inventory_value.cents(), 30_000);
        assert_eq!(stats.low_stock.len(), 2);
        assert_eq!(stats.low_stock[0].stock, 0);
        assert_eq!(stats.pending_quotes, 3);
    }

    #[test]
    fn test_empty_dashboard() {
        let stats = compute_dashboard(&DashboardInput {
            orders: &[],
            inventory: &[],
            quote_counts: &HashMap::new(),
            currency: CurrencyCode::Usd,
            low_stock_threshold: 10,
            now: Utc::now(),
        })
        .unwrap();
        assert!(stats.revenue.is_zero());
        assert!(stats.average_order_value.is_zero());
        assert!(stats.top_products.is_empty());
        assert_eq!(stats.pending_quotes, 0);
    }
}
