//! Payment provider API objects.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Payment intent lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl PaymentIntentStatus {
    /// The customer has not paid yet, so the amount can still change.
    #[must_use]
    pub const fn is_updatable(self) -> bool {
        matches!(
            self,
            Self::RequiresPaymentMethod | Self::RequiresConfirmation | Self::RequiresAction
        )
    }

    /// Money has moved or is moving; the intent can no longer be replaced.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(
            self,
            Self::Processing | Self::RequiresCapture | Self::Succeeded
        )
    }
}

/// A payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    /// Handed to the web client to confirm the payment. Never logged.
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Unix timestamp.
    pub created: i64,
}

/// One page of payment intents, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentList {
    pub data: Vec<PaymentIntent>,
    pub has_more: bool,
}

/// A refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    pub payment_intent: Option<String>,
    pub status: String,
}

/// A charge, as carried by `charge.*` webhook events.
#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    pub payment_intent: Option<String>,
    /// Cumulative refunded amount in minor units.
    #[serde(default)]
    pub amount_refunded: i64,
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

/// The object an event is about.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// Decode the event's object.
    ///
    /// # Errors
    ///
    /// Returns a message if the object does not have the expected shape.
    pub fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| e.to_string())
    }
}

/// Who and what a payment intent is for. Stored as intent metadata so the
/// provider dashboard and webhooks can be traced back to a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentMetadata {
    pub user_id: String,
    pub cart_id: String,
    pub user_email: String,
}

impl IntentMetadata {
    /// Form fields in the provider's `metadata[key]` syntax.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("metadata[user_id]".to_string(), self.user_id.clone()),
            ("metadata[cart_id]".to_string(), self.cart_id.clone()),
            ("metadata[user_email]".to_string(), self.user_email.clone()),
        ]
    }
}

/// Error body returned by the provider.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub message: Option<String>,
    pub code: Option<String>,
}
