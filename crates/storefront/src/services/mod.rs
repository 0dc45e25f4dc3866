//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `payments` - Card-payment provider client and webhook verification
//! - `identity` - Identity provider client and session cache
//! - `checkout` - Cart pricing, payment intent reconciliation, order creation
//! - `catalog` - Cached product reads
//! - `stats` - Staff dashboard aggregation
//! - `email` - Order and quote notifications

pub mod catalog;
pub mod checkout;
pub mod email;
pub mod identity;
pub mod payments;
pub mod stats;
