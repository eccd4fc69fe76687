// models/mod.rs - Typed rows and the domain rules that belong to them

pub mod approval;
pub mod conversation;
pub mod order;
pub mod product;
pub mod seller;
pub mod travel;
pub mod user;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::ValidationErrors;

pub use approval::{Approval, ApprovalItemKind, ApprovalRequesterKind, ApprovalStatus};
pub use conversation::{Conversation, LatestMessage, Message};
pub use order::{Order, OrderItem, OrderStatus, Payment, PaymentMethod, PaymentStatus, StatusChange, Tracking};
pub use product::{Product, ProductCategory};
pub use seller::{Seller, SellerStatus, ServiceBranch};
pub use travel::{Booking, BookingStatus, TravelListing, TravelReview};
pub use user::{User, UserRole};

/// Refused state changes on orders, sellers, bookings and approvals
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransitionError {
    #[error("Cannot move {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Order in status '{0}' can no longer be cancelled")]
    NotCancellable(String),

    #[error("Order cannot be refunded: {0}")]
    NotRefundable(String),

    #[error("Payment already recorded as '{0}'")]
    PaymentAlreadyRecorded(String),

    #[error("Approval has already been {0}")]
    AlreadyDecided(String),
}

/// Postal address sub-document shared by sellers and orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

fn default_country() -> String {
    "India".to_string()
}

impl Address {
    /// Validate into `errors` with every key prefixed by `prefix`
    pub fn validate_into(&self, prefix: &str, errors: &mut ValidationErrors) {
        errors.required_text(&format!("{}.full_name", prefix), &self.full_name, 2, 100);
        errors.required_text(&format!("{}.line1", prefix), &self.line1, 3, 200);
        errors.optional_text(&format!("{}.line2", prefix), self.line2.as_deref(), 200);
        errors.required_text(&format!("{}.city", prefix), &self.city, 2, 100);
        errors.required_text(&format!("{}.state", prefix), &self.state, 2, 100);
        let pin = self.postal_code.trim();
        if pin.len() != 6 || !pin.chars().all(|c| c.is_ascii_digit()) {
            errors.add(format!("{}.postal_code", prefix), "Postal code must be 6 digits");
        }
        if let Some(phone) = &self.phone {
            errors.phone(&format!("{}.phone", prefix), phone);
        }
    }
}

/// Paged list payload
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        Self { items, total, limit, offset }
    }

    pub fn map<U: Serialize>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Limit/offset query parameters shared by list endpoints
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Paging {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Paging {
    /// Clamp to the configured bounds
    pub fn resolve(&self) -> (i64, i64) {
        let filter = &crate::config::config().filter;
        let max = filter.max_limit.unwrap_or(i32::MAX) as i64;
        let limit = self.limit.unwrap_or(filter.default_limit as i64).clamp(1, max);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}
