use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{Address, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seller_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SellerStatus {
    Pending,
    Active,
    Suspended,
    Rejected,
}

impl SellerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SellerStatus::Pending => "pending",
            SellerStatus::Active => "active",
            SellerStatus::Suspended => "suspended",
            SellerStatus::Rejected => "rejected",
        }
    }

    pub fn can_transition_to(&self, next: SellerStatus) -> bool {
        use SellerStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Rejected)
                | (Active, Suspended)
                | (Suspended, Active)
                | (Rejected, Pending)
        )
    }

    pub fn transition_to(&self, next: SellerStatus) -> Result<SellerStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError::InvalidTransition {
                entity: "seller",
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "service_branch", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServiceBranch {
    Army,
    Navy,
    AirForce,
    CoastGuard,
    Paramilitary,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Seller {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: String,
    pub description: Option<String>,
    pub service_branch: ServiceBranch,
    pub rank: String,
    pub service_number: String,
    pub years_of_service: i32,
    pub discharge_year: Option<i32>,
    pub phone: String,
    pub whatsapp: Option<String>,
    pub email: String,
    pub address: Json<Address>,
    pub verification_documents: Vec<String>,
    pub status: SellerStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Seller {
    pub fn is_active(&self) -> bool {
        self.status == SellerStatus::Active
    }

    /// Public view hides service number and verification documents
    pub fn public_view(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "business_name": self.business_name,
            "description": self.description,
            "service_branch": self.service_branch,
            "rank": self.rank,
            "years_of_service": self.years_of_service,
            "city": self.address.city,
            "state": self.address.state,
            "status": self.status,
            "created_at": self.created_at,
        })
    }
}
