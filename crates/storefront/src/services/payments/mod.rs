//! Card-payment provider integration.
//!
//! The provider speaks a Stripe-compatible REST API: form-encoded requests,
//! bearer secret key, JSON responses and HMAC-signed webhooks.

mod client;
mod error;
pub mod types;
pub mod webhook;

pub use client::PaymentsClient;
pub use error::PaymentError;
pub use types::{
    Charge, IntentMetadata, PaymentIntent, PaymentIntentList, PaymentIntentStatus, Refund,
    WebhookEvent,
};
