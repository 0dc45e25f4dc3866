//! Stitchworks Core - Shared domain types.
//!
//! This crate provides the types used by every Stitchworks component:
//! - `storefront` - Customer and staff JSON API server
//! - `cli` - Command-line tools for migrations, seeding and staff roles
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Status transition tables and role permissions live
//! here so every caller enforces the same lifecycle.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, email, sizes, statuses and staff roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
