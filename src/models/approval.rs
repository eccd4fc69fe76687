use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_item_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalItemKind {
    Seller,
    Product,
    TravelListing,
}

impl ApprovalItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalItemKind::Seller => "seller",
            ApprovalItemKind::Product => "product",
            ApprovalItemKind::TravelListing => "travel_listing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_requester_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalRequesterKind {
    User,
    Seller,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Approval {
    pub id: Uuid,
    pub requester_kind: ApprovalRequesterKind,
    pub requester_id: Uuid,
    pub item_kind: ApprovalItemKind,
    pub item_id: Uuid,
    pub status: ApprovalStatus,
    pub reviewer_id: Option<Uuid>,
    pub notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Approval {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Record the reviewer's decision. Only pending approvals can be decided.
    pub fn decide(
        &mut self,
        decision: ApprovalStatus,
        reviewer_id: Uuid,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.is_pending() {
            return Err(TransitionError::AlreadyDecided(self.status.as_str().to_string()));
        }
        if decision == ApprovalStatus::Pending {
            return Err(TransitionError::InvalidTransition {
                entity: "approval",
                from: self.status.as_str().to_string(),
                to: decision.as_str().to_string(),
            });
        }
        self.status = decision;
        self.reviewer_id = Some(reviewer_id);
        self.notes = notes;
        self.reviewed_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Approval {
        let now = Utc::now();
        Approval {
            id: Uuid::new_v4(),
            requester_kind: ApprovalRequesterKind::Seller,
            requester_id: Uuid::new_v4(),
            item_kind: ApprovalItemKind::Product,
            item_id: Uuid::new_v4(),
            status: ApprovalStatus::Pending,
            reviewer_id: None,
            notes: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn decide_stamps_reviewer() {
        let mut approval = pending();
        let reviewer = Uuid::new_v4();
        approval
            .decide(ApprovalStatus::Approved, reviewer, Some("looks good".to_string()), Utc::now())
            .unwrap();
        assert_eq!(approval.status, ApprovalStatus::Approved);
        assert_eq!(approval.reviewer_id, Some(reviewer));
        assert!(approval.reviewed_at.is_some());
    }

    #[test]
    fn second_decision_is_refused() {
        let mut approval = pending();
        approval
            .decide(ApprovalStatus::Rejected, Uuid::new_v4(), Some("blurry photos".to_string()), Utc::now())
            .unwrap();
        let err = approval
            .decide(ApprovalStatus::Approved, Uuid::new_v4(), None, Utc::now())
            .unwrap_err();
        assert_eq!(err, TransitionError::AlreadyDecided("rejected".to_string()));
        assert_eq!(approval.notes.as_deref(), Some("blurry photos"));
    }

    #[test]
    fn cannot_decide_back_to_pending() {
        let mut approval = pending();
        assert!(approval
            .decide(ApprovalStatus::Pending, Uuid::new_v4(), None, Utc::now())
            .is_err());
        assert!(approval.is_pending());
    }
}
