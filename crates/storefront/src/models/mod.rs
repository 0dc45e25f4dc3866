//! Domain models for the storefront.
//!
//! Models are plain documents: they are what repositories return and what
//! routes serialize. Prices are whole cents; the store currency comes from
//! configuration.

pub mod cart;
pub mod design;
pub mod order;
pub mod product;
pub mod quote;
pub mod user;

pub use cart::{Cart, CartItem, CheckoutSnapshot, NewCartItem};
pub use design::{Design, DesignInput, DesignTemplate, DesignTemplateInput};
pub use order::{Order, OrderLine, OrderLineSize, ShippingAddress};
pub use product::{
    ColorInput, Product, ProductColor, ProductDetail, ProductFilter, ProductInput, SizeVariant,
    SizeVariantInput,
};
pub use quote::{NewQuote, Quote, QuoteResponse, QuoteWithResponses};
pub use user::AuthenticatedUser;
