/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Write operations supported throughout the system
/// Used by the observer pipeline and the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Table names shared by services, observers and the filter whitelist
pub mod schema {
    pub const USERS: &str = "users";
    pub const SELLERS: &str = "esm_sellers";
    pub const PRODUCTS: &str = "esm_products";
    pub const ORDERS: &str = "orders";
    pub const CONVERSATIONS: &str = "conversations";
    pub const MESSAGES: &str = "messages";
    pub const APPROVALS: &str = "approvals";
    pub const TRAVEL_LISTINGS: &str = "travel_listings";
    pub const BOOKINGS: &str = "bookings";
    pub const TRAVEL_REVIEWS: &str = "travel_reviews";
}
