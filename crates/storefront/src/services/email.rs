//! Email service for order and quote notifications.
//!
//! Uses SMTP via lettre for delivery with Askama text and HTML templates.
//! Notifications are best effort: a failed send is logged and never fails
//! the request that triggered it.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use stitchworks_core::Money;

use crate::config::EmailConfig;
use crate::models::{Order, Quote};

/// One rendered order line.
pub struct LineSummary {
    pub description: String,
    pub units: u32,
    pub total: String,
}

fn line_summaries(order: &Order) -> Vec<LineSummary> {
    order
        .items
        .iter()
        .map(|line| LineSummary {
            description: format!(
                "{} ({}) {}",
                line.product_name,
                line.color_name,
                line.sizes
                    .iter()
                    .map(|s| format!("{}x{}", s.size, s.quantity))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            units: line.units,
            total: Money::from_cents(line.line_total_cents, order.currency).display(),
        })
        .collect()
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order_id: i32,
    lines: &'a [LineSummary],
    total: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order_id: i32,
    lines: &'a [LineSummary],
    total: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_shipped.html")]
struct OrderShippedHtml<'a> {
    order_id: i32,
    carrier: &'a str,
    tracking_number: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_shipped.txt")]
struct OrderShippedText<'a> {
    order_id: i32,
    carrier: &'a str,
    tracking_number: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/quote_response.html")]
struct QuoteResponseHtml<'a> {
    name: &'a str,
    quote_id: i32,
    status: &'a str,
    message: &'a str,
    price: Option<String>,
    quote_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/quote_response.txt")]
struct QuoteResponseText<'a> {
    name: &'a str,
    quote_id: i32,
    status: &'a str,
    message: &'a str,
    price: Option<String>,
    quote_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    base_url: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// `base_url` is the web client's origin, used for links.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, base_url: &str) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            base_url: base_url.to_string(),
        })
    }

    /// Send the order confirmation.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(&self, order: &Order) -> Result<(), EmailError> {
        let lines = line_summaries(order);
        let total = order.total().display();
        let order_url = format!("{}/orders/{}", self.base_url, order.id);
        let order_id = order.id.as_i32();

        let html = OrderConfirmationHtml {
            order_id,
            lines: &lines,
            total: &total,
            order_url: &order_url,
        }
        .render()?;
        let text = OrderConfirmationText {
            order_id,
            lines: &lines,
            total: &total,
            order_url: &order_url,
        }
        .render()?;

        self.send_multipart_email(
            &order.email,
            &format!("Your Stitchworks order #{order_id}"),
            &text,
            &html,
        )
        .await
    }

    /// Tell the customer their order is on its way.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_shipped(&self, order: &Order) -> Result<(), EmailError> {
        let carrier = order.carrier.as_deref().unwrap_or_default();
        let tracking_number = order.tracking_number.as_deref().unwrap_or_default();
        let order_url = format!("{}/orders/{}", self.base_url, order.id);
        let order_id = order.id.as_i32();

        let html = OrderShippedHtml {
            order_id,
            carrier,
            tracking_number,
            order_url: &order_url,
        }
        .render()?;
        let text = OrderShippedText {
            order_id,
            carrier,
            tracking_number,
            order_url: &order_url,
        }
        .render()?;

        self.send_multipart_email(
            &order.email,
            &format!("Order #{order_id} has shipped"),
            &text,
            &html,
        )
        .await
    }

    /// Tell the customer staff responded to their quote.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_quote_response(
        &self,
        quote: &Quote,
        message: &str,
        price: Option<Money>,
    ) -> Result<(), EmailError> {
        let quote_url = format!("{}/quotes/{}", self.base_url, quote.id);
        let status = quote.status.as_str().replace('_', " ");
        let quote_id = quote.id.as_i32();

        let html = QuoteResponseHtml {
            name: &quote.contact_name,
            quote_id,
            status: &status,
            message,
            price: price.map(|p| p.display()),
            quote_url: &quote_url,
        }
        .render()?;
        let text = QuoteResponseText {
            name: &quote.contact_name,
            quote_id,
            status: &status,
            message,
            price: price.map(|p| p.display()),
            quote_url: &quote_url,
        }
        .render()?;

        self.send_multipart_email(
            &quote.contact_email,
            &format!("Update on your quote request #{quote_id}"),
            &text,
            &html,
        )
        .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Send a notification in the background if email is configured.
///
/// The request never waits on SMTP; failures are logged.
pub fn spawn_notification<F, Fut>(service: Option<&EmailService>, kind: &'static str, send: F)
where
    F: FnOnce(EmailService) -> Fut,
    Fut: std::future::Future<Output = Result<(), EmailError>> + Send + 'static,
{
    let Some(service) = service else {
        tracing::debug!(kind, "Email not configured, skipping notification");
        return;
    };
    let fut = send(service.clone());
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            tracing::error!(kind, error = %e, "Failed to send notification email");
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{OrderLine, OrderLineSize};
    use stitchworks_core::{ColorId, CurrencyCode, OrderId, OrderStatus, ProductId, ShirtSize, UserId};

    fn order() -> Order {
        let now = chrono::Utc::now();
        Order {
            id: OrderId::new(42),
            user_id: UserId::new("user_1"),
            email: "buyer@example.com".to_string(),
            payment_intent_id: "pi_1".to_string(),
            status: OrderStatus::Paid,
            items: vec![OrderLine {
                product_id: ProductId::new(1),
                product_name: "Classic Tee".to_string(),
                color_id: ColorId::new(3),
                color_name: "Navy".to_string(),
                design_id: None,
                sizes: vec![
                    OrderLineSize {
                        size: ShirtSize::M,
                        quantity: 2,
                        unit_price_cents: 2000,
                    },
                    OrderLineSize {
                        size: ShirtSize::Xxl,
                        quantity: 1,
                        unit_price_cents: 2400,
                    },
                ],
                units: 3,
                line_total_cents: 6400,
            }],
            subtotal_cents: 6400,
            total_cents: 6400,
            refunded_cents: 0,
            currency: CurrencyCode::Usd,
            shipping_address: None,
            carrier: None,
            tracking_number: None,
            shipped_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_line_summaries() {
        let lines = line_summaries(&order());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].description, "Classic Tee (Navy) Mx2, 2XLx1");
        assert_eq!(lines[0].total, "$64.00");
    }

    #[test]
    fn test_order_confirmation_renders() {
        let lines = line_summaries(&order());
        let text = OrderConfirmationText {
            order_id: 42,
            lines: &lines,
            total: "$64.00",
            order_url: "https://stitchworks.shop/orders/42",
        }
        .render()
        .unwrap();
        assert!(text.contains("#42"));
        assert!(text.contains("Classic Tee (Navy)"));
        assert!(text.contains("$64.00"));
    }

    #[test]
    fn test_quote_response_renders_price() {
        let html = QuoteResponseHtml {
            name: "Grace",
            quote_id: 7,
            status: "quoted",
            message: "Screen print, 3 colors",
            price: Some("$480.00".to_string()),
            quote_url: "https://stitchworks.shop/quotes/7",
        }
        .render()
        .unwrap();
        assert!(html.contains("$480.00"));
        assert!(html.contains("Grace"));
    }
}
