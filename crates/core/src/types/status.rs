//! Status enums and their allowed transitions.
//!
//! Every status change in the server goes through `can_transition_to`, so the
//! tables here are the single source of truth for order and quote lifecycles.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Orders are only created once payment has succeeded, so the first status
/// is `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Paid,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Refunded,
    ];

    /// Whether an order may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Paid, Self::Processing | Self::Cancelled | Self::Refunded)
                | (
                    Self::Processing,
                    Self::Shipped | Self::Cancelled | Self::Refunded
                )
                | (Self::Shipped, Self::Delivered | Self::Refunded)
                | (Self::Delivered, Self::Refunded)
        )
    }

    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Whether the order's total is counted as revenue.
    #[must_use]
    pub const fn counts_as_revenue(self) -> bool {
        !self.is_terminal()
    }

    /// Snake-case name as stored and serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Who is asking for a quote transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteActor {
    /// The customer who requested the quote.
    Customer,
    /// A staff member responding to the request.
    Staff,
}

/// Request-for-quote lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.quote_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[default]
    Pending,
    InReview,
    Quoted,
    Accepted,
    Declined,
    Rejected,
    Cancelled,
    Completed,
}

impl QuoteStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::Pending,
        Self::InReview,
        Self::Quoted,
        Self::Accepted,
        Self::Declined,
        Self::Rejected,
        Self::Cancelled,
        Self::Completed,
    ];

    /// Whether `actor` may move a quote from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self, actor: QuoteActor) -> bool {
        match actor {
            QuoteActor::Staff => matches!(
                (self, next),
                (Self::Pending, Self::InReview | Self::Rejected)
                    | (Self::InReview, Self::Quoted | Self::Rejected)
                    | (Self::Quoted, Self::InReview)
                    | (Self::Accepted, Self::Completed)
            ),
            QuoteActor::Customer => matches!(
                (self, next),
                (Self::Quoted, Self::Accepted | Self::Declined)
                    | (Self::Pending | Self::InReview, Self::Cancelled)
            ),
        }
    }

    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Declined | Self::Rejected | Self::Cancelled | Self::Completed
        )
    }

    /// Still waiting on staff.
    #[must_use]
    pub const fn awaiting_staff(self) -> bool {
        matches!(self, Self::Pending | Self::InReview)
    }

    /// Snake-case name as stored and serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Quoted => "quoted",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid quote status: {s}"))
    }
}

/// Something a staff member may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageProducts,
    ManageTemplates,
    ManageQuotes,
    ManageFulfillment,
    ViewDashboard,
    ManageTransactions,
}

impl Permission {
    /// Every permission.
    pub const ALL: [Self; 6] = [
        Self::ManageProducts,
        Self::ManageTemplates,
        Self::ManageQuotes,
        Self::ManageFulfillment,
        Self::ViewDashboard,
        Self::ManageTransactions,
    ];
}

/// Staff role, stored as role metadata at the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// Full access to every staff feature.
    Admin,
    /// Design templates and quote responses.
    Designer,
    /// Order fulfillment.
    Shipper,
}

impl StaffRole {
    /// Whether this role grants `permission`.
    #[must_use]
    pub const fn allows(self, permission: Permission) -> bool {
        match self {
            Self::Admin => true,
            Self::Designer => matches!(
                permission,
                Permission::ManageTemplates | Permission::ManageQuotes
            ),
            Self::Shipper => matches!(permission, Permission::ManageFulfillment),
        }
    }

    /// Parse role metadata; unknown values mean "not staff".
    #[must_use]
    pub fn from_metadata(value: Option<&str>) -> Option<Self> {
        value.and_then(|v| v.parse().ok())
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Designer => write!(f, "designer"),
            Self::Shipper => write!(f, "shipper"),
        }
    }
}

impl std::str::FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "designer" => Ok(Self::Designer),
            "shipper" => Ok(Self::Shipper),
            _ => Err(format!("invalid staff role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_happy_path() {
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_order_cannot_go_backwards() {
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_order_terminal_states() {
        for next in OrderStatus::ALL {
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
            assert!(!OrderStatus::Refunded.can_transition_to(next));
        }
        assert!(!OrderStatus::Refunded.counts_as_revenue());
        assert!(OrderStatus::Shipped.counts_as_revenue());
    }

    #[test]
    fn test_quote_staff_transitions() {
        use QuoteStatus::*;
        let staff = QuoteActor::Staff;
        assert!(Pending.can_transition_to(InReview, staff));
        assert!(InReview.can_transition_to(Quoted, staff));
        assert!(Quoted.can_transition_to(InReview, staff));
        assert!(Accepted.can_transition_to(Completed, staff));
        assert!(!Quoted.can_transition_to(Accepted, staff));
        assert!(!Pending.can_transition_to(Quoted, staff));
    }

    #[test]
    fn test_quote_customer_transitions() {
        use QuoteStatus::*;
        let customer = QuoteActor::Customer;
        assert!(Quoted.can_transition_to(Accepted, customer));
        assert!(Quoted.can_transition_to(Declined, customer));
        assert!(Pending.can_transition_to(Cancelled, customer));
        assert!(!Quoted.can_transition_to(Cancelled, customer));
        assert!(!Pending.can_transition_to(Accepted, customer));
        assert!(!InReview.can_transition_to(Quoted, customer));
    }

    #[test]
    fn test_quote_terminal_states_have_no_exits() {
        for from in QuoteStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in QuoteStatus::ALL {
                assert!(!from.can_transition_to(to, QuoteActor::Staff));
                assert!(!from.can_transition_to(to, QuoteActor::Customer));
            }
        }
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in QuoteStatus::ALL {
            assert_eq!(status.as_str().parse::<QuoteStatus>().unwrap(), status);
        }
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&QuoteStatus::InReview).unwrap(),
            "\"in_review\""
        );
    }

    #[test]
    fn test_role_permissions() {
        use Permission::*;
        assert!(StaffRole::Admin.allows(ViewDashboard));
        assert!(StaffRole::Admin.allows(ManageTransactions));
        assert!(StaffRole::Designer.allows(ManageTemplates));
        assert!(StaffRole::Designer.allows(ManageQuotes));
        assert!(!StaffRole::Designer.allows(ManageProducts));
        assert!(StaffRole::Shipper.allows(ManageFulfillment));
        assert!(!StaffRole::Shipper.allows(ViewDashboard));
    }

    #[test]
    fn test_role_from_metadata() {
        assert_eq!(
            StaffRole::from_metadata(Some("designer")),
            Some(StaffRole::Designer)
        );
        assert_eq!(StaffRole::from_metadata(Some("customer")), None);
        assert_eq!(StaffRole::from_metadata(None), None);
    }
}
