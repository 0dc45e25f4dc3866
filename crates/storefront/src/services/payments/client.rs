//! Payment provider HTTP client.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use stitchworks_core::Money;

use super::types::{ErrorBody, IntentMetadata, PaymentIntent, PaymentIntentList, Refund};
use super::webhook::{DEFAULT_TOLERANCE_SECS, verify_signature};
use super::{PaymentError, WebhookEvent};
use crate::config::PaymentsConfig;

/// Largest page the provider serves.
const MAX_PAGE_SIZE: u32 = 100;

/// Payment provider API client.
#[derive(Clone)]
pub struct PaymentsClient {
    client: Client,
    api_base: String,
    webhook_secret: SecretString,
}

impl PaymentsClient {
    /// Create a new payment provider client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentsConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaymentError::Parse(format!("Invalid secret key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("Authorization", auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            webhook_secret: config.webhook_secret.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    /// Attach a fresh idempotency key so a retried POST never charges twice.
    fn idempotent(request: RequestBuilder) -> RequestBuilder {
        request.header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, PaymentError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .map(|e| match (e.error.code, e.error.message) {
                    (Some(code), Some(message)) => format!("{code}: {message}"),
                    (None, Some(message)) => message,
                    (Some(code), None) => code,
                    (None, None) => body.clone(),
                })
                .unwrap_or(body);
            warn!(status = status.as_u16(), %message, "Payment provider error");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))
    }

    /// Create a payment intent for `amount` with automatic payment methods.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, metadata), fields(amount = amount.cents()))]
    pub async fn create_payment_intent(
        &self,
        amount: Money,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut form = vec![
            ("amount".to_string(), amount.cents().to_string()),
            ("currency".to_string(), amount.currency().code().to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        form.extend(metadata.form_fields());

        let intent: PaymentIntent = Self::send(Self::idempotent(
            self.client.post(self.url("/v1/payment_intents")).form(&form),
        ))
        .await?;

        debug!(payment_intent_id = %intent.id, "Created payment intent");
        Ok(intent)
    }

    /// Fetch a payment intent.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
        Self::send(
            self.client
                .get(self.url(&format!("/v1/payment_intents/{id}"))),
        )
        .await
    }

    /// Change the amount of an unpaid payment intent.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn update_payment_intent_amount(
        &self,
        id: &str,
        amount_cents: i64,
    ) -> Result<PaymentIntent, PaymentError> {
        Self::send(Self::idempotent(
            self.client
                .post(self.url(&format!("/v1/payment_intents/{id}")))
                .form(&[("amount", amount_cents.to_string())]),
        ))
        .await
    }

    /// Cancel a payment intent.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn cancel_payment_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
        Self::send(Self::idempotent(
            self.client
                .post(self.url(&format!("/v1/payment_intents/{id}/cancel"))),
        ))
        .await
    }

    /// List payment intents, newest first.
    ///
    /// `starting_after` is the last intent id of the previous page.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_payment_intents(
        &self,
        limit: u32,
        starting_after: Option<&str>,
    ) -> Result<PaymentIntentList, PaymentError> {
        let mut url = Url::parse(&self.url("/v1/payment_intents"))
            .map_err(|e| PaymentError::Parse(format!("Invalid API base: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.clamp(1, MAX_PAGE_SIZE).to_string());
            if let Some(cursor) = starting_after {
                query.append_pair("starting_after", cursor);
            }
        }

        Self::send(self.client.get(url)).await
    }

    /// Refund a payment intent, fully or by `amount_cents`.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_cents: Option<i64>,
    ) -> Result<Refund, PaymentError> {
        let mut form = vec![("payment_intent", payment_intent_id.to_string())];
        if let Some(amount) = amount_cents {
            form.push(("amount", amount.to_string()));
        }

        Self::send(Self::idempotent(
            self.client.post(self.url("/v1/refunds")).form(&form),
        ))
        .await
    }

    /// Verify a webhook's signature and parse the event.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` for bad signatures and
    /// `PaymentError::Parse` for an unreadable body.
    pub fn verify_webhook(
        &self,
        payload: &str,
        signature_header: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        let now = chrono::Utc::now().timestamp();
        verify_signature(
            &self.webhook_secret,
            payload,
            signature_header,
            DEFAULT_TOLERANCE_SECS,
            now,
        )?;
        serde_json::from_str(payload).map_err(|e| PaymentError::Parse(e.to_string()))
    }
}
