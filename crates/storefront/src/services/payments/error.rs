//! Payment provider errors.

use thiserror::Error;

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or payload.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Webhook signature missing, stale or wrong.
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),
}
