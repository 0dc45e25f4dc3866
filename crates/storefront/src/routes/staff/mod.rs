//! Staff API, mounted at `/api/staff`.
//!
//! Every handler takes `RequireStaff` and then checks the one permission it
//! needs with `require_permission`:
//!
//! | Area | Permission |
//! |------|------------|
//! | products, colors, sizes | `ManageProducts` |
//! | design templates | `ManageTemplates` |
//! | quotes | `ManageQuotes` |
//! | orders, shipping | `ManageFulfillment` |
//! | refunds, transactions | `ManageTransactions` |
//! | dashboard | `ViewDashboard` |

pub mod dashboard;
pub mod orders;
pub mod products;
pub mod quotes;
pub mod templates;
pub mod transactions;

use axum::Router;

use crate::state::AppState;

/// Create the staff routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(products::router())
        .merge(templates::router())
        .merge(quotes::router())
        .merge(orders::router())
        .merge(dashboard::router())
        .merge(transactions::router())
}
