//! Requests for quote (bulk or custom orders) and staff responses.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stitchworks_core::{
    DesignId, Email, ProductId, QuoteId, QuoteResponseId, QuoteStatus, SizeQuantities, UserId,
};

/// A customer's request for a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub user_id: UserId,
    pub contact_name: String,
    pub contact_email: String,
    pub phone: Option<String>,
    pub product_id: Option<ProductId>,
    pub design_id: Option<DesignId>,
    pub quantities: SizeQuantities,
    pub deadline: Option<NaiveDate>,
    pub notes: String,
    pub status: QuoteStatus,
    pub quoted_price_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for requesting a quote.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuote {
    pub contact_name: String,
    pub contact_email: String,
    pub phone: Option<String>,
    pub product_id: Option<ProductId>,
    pub design_id: Option<DesignId>,
    pub quantities: SizeQuantities,
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
}

impl NewQuote {
    /// Validate field contents. `today` bounds the deadline.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self, today: NaiveDate) -> Result<(), String> {
        if self.contact_name.trim().is_empty() {
            return Err("contact name is required".to_string());
        }
        Email::parse(&self.contact_email).map_err(|e| e.to_string())?;
        if self.quantities.total_units() < 1 {
            return Err("a quote needs at least one garment".to_string());
        }
        if let Some(deadline) = self.deadline
            && deadline < today
        {
            return Err("deadline cannot be in the past".to_string());
        }
        Ok(())
    }
}

/// One entry in a quote's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub id: QuoteResponseId,
    pub quote_id: QuoteId,
    pub staff_user_id: UserId,
    pub staff_name: String,
    pub message: String,
    pub quoted_price_cents: Option<i64>,
    pub from_status: QuoteStatus,
    pub to_status: QuoteStatus,
    pub created_at: DateTime<Utc>,
}

/// A quote with its responses, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteWithResponses {
    #[serde(flatten)]
    pub quote: Quote,
    pub responses: Vec<QuoteResponse>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use stitchworks_core::ShirtSize;

    fn request() -> NewQuote {
        NewQuote {
            contact_name: "Grace".to_string(),
            contact_email: "grace@example.com".to_string(),
            phone: None,
            product_id: None,
            design_id: None,
            quantities: [(ShirtSize::L, 24)].into_iter().collect(),
            deadline: None,
            notes: String::new(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn test_valid_quote() {
        assert!(request().validate(today()).is_ok());
    }

    #[test]
    fn test_quote_needs_garments() {
        let mut q = request();
        q.quantities = SizeQuantities::new();
        assert!(q.validate(today()).is_err());
    }

    #[test]
    fn test_quote_rejects_bad_email_and_past_deadline() {
        let mut q = request();
        q.contact_email = "not-an-email".to_string();
        assert!(q.validate(today()).is_err());

        let mut q = request();
        q.deadline = NaiveDate::from_ymd_opt(2026, 2, 1);
        assert!(q.validate(today()).is_err());
    }
}
