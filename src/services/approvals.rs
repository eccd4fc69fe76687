use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::{DatabaseError, DatabaseManager, Record, Repository};
use crate::error::ApiError;
use crate::filter::{ColumnKind, FilterData, TableSpec};
use crate::middleware::AuthUser;
use crate::models::{
    Approval, ApprovalItemKind, ApprovalRequesterKind, ApprovalStatus, Page, Product, Seller, SellerStatus,
    TravelListing,
};
use crate::observer::ObserverContext;
use crate::types::schema;

pub static APPROVALS_TABLE: TableSpec = TableSpec {
    table: schema::APPROVALS,
    columns: &[
        ("id", ColumnKind::Uuid),
        ("status", ColumnKind::Enum),
        ("item_kind", ColumnKind::Enum),
        ("item_id", ColumnKind::Uuid),
        ("requester_kind", ColumnKind::Enum),
        ("requester_id", ColumnKind::Uuid),
        ("reviewer_id", ColumnKind::Uuid),
        ("reviewed_at", ColumnKind::Timestamp),
        ("created_at", ColumnKind::Timestamp),
    ],
    default_order: "created_at asc",
};

#[derive(Debug, Default, Deserialize)]
pub struct ApprovalListQuery {
    pub status: Option<ApprovalStatus>,
    pub item_kind: Option<ApprovalItemKind>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl ApprovalListQuery {
    pub fn to_filter(&self) -> FilterData {
        let mut conditions = Map::new();
        if let Some(status) = self.status {
            conditions.insert("status".into(), json!(status.as_str()));
        }
        if let Some(kind) = self.item_kind {
            conditions.insert("item_kind".into(), json!(kind.as_str()));
        }
        // pending queue oldest first, decided history newest first
        let order = match self.status {
            Some(ApprovalStatus::Pending) | None => "created_at asc",
            Some(_) => "reviewed_at desc",
        };
        FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: Some(json!(order)),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// Approval plus a snapshot of the item under review
#[derive(Debug, Serialize)]
pub struct ApprovalDetail {
    #[serde(flatten)]
    pub approval: Approval,
    pub item: Option<Value>,
}

/// Queue an item for moderation. An item has at most one pending approval;
/// submitting again returns the one already queued.
pub(crate) async fn submit(
    conn: &mut PgConnection,
    requester_kind: ApprovalRequesterKind,
    requester_id: Uuid,
    item_kind: ApprovalItemKind,
    item_id: Uuid,
) -> Result<Approval, ApiError> {
    let inserted = sqlx::query_as::<_, Approval>(
        "INSERT INTO approvals (id, requester_kind, requester_id, item_kind, item_id) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (item_kind, item_id) WHERE status = 'pending' DO NOTHING \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(requester_kind)
    .bind(requester_id)
    .bind(item_kind)
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?;

    let approval = match inserted {
        Some(approval) => {
            tracing::info!(
                approval_id = %approval.id,
                item_kind = item_kind.as_str(),
                item_id = %item_id,
                "Submitted for approval"
            );
            approval
        }
        None => sqlx::query_as::<_, Approval>(
            "SELECT * FROM approvals WHERE item_kind = $1 AND item_id = $2 AND status = 'pending'",
        )
        .bind(item_kind)
        .bind(item_id)
        .fetch_one(&mut *conn)
        .await?,
    };
    Ok(approval)
}

/// Close whatever approval is pending for an item, e.g. when an admin
/// changes a seller's status directly or the item is deleted
pub(crate) async fn resolve_pending(
    conn: &mut PgConnection,
    item_kind: ApprovalItemKind,
    item_id: Uuid,
    decision: ApprovalStatus,
    reviewer_id: Option<Uuid>,
    notes: Option<&str>,
) -> Result<u64, ApiError> {
    let result = sqlx::query(
        "UPDATE approvals SET status = $3, reviewer_id = $4, notes = COALESCE($5, notes), \
         reviewed_at = NOW(), updated_at = NOW() \
         WHERE item_kind = $1 AND item_id = $2 AND status = 'pending'",
    )
    .bind(item_kind)
    .bind(item_id)
    .bind(decision)
    .bind(reviewer_id)
    .bind(notes)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub struct ApprovalService {
    pool: PgPool,
}

impl ApprovalService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_approvals(&self, query: ApprovalListQuery) -> Result<Page<Approval>, ApiError> {
        Repository::<Approval>::new(&APPROVALS_TABLE, self.pool.clone())
            .select_page(query.to_filter(), None)
            .await
    }

    pub async fn get_approval(&self, id: Uuid) -> Result<ApprovalDetail, ApiError> {
        let approval = sqlx::query_as::<_, Approval>("SELECT * FROM approvals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Approval not found"))?;

        let item = match approval.item_kind {
            ApprovalItemKind::Seller => sqlx::query_as::<_, Seller>("SELECT * FROM esm_sellers WHERE id = $1")
                .bind(approval.item_id)
                .fetch_optional(&self.pool)
                .await?
                .map(serde_json::to_value)
                .transpose()?,
            ApprovalItemKind::Product => sqlx::query_as::<_, Product>("SELECT * FROM esm_products WHERE id = $1")
                .bind(approval.item_id)
                .fetch_optional(&self.pool)
                .await?
                .map(serde_json::to_value)
                .transpose()?,
            ApprovalItemKind::TravelListing => {
                sqlx::query_as::<_, TravelListing>("SELECT * FROM travel_listings WHERE id = $1")
                    .bind(approval.item_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .map(serde_json::to_value)
                    .transpose()?
            }
        };

        Ok(ApprovalDetail { approval, item })
    }

    pub async fn approve(&self, admin: &AuthUser, id: Uuid, req: DecisionRequest) -> Result<Approval, ApiError> {
        let notes = req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        self.decide(admin, id, ApprovalStatus::Approved, notes).await
    }

    /// Rejections must say why; the note is shown to the requester
    pub async fn reject(&self, admin: &AuthUser, id: Uuid, req: DecisionRequest) -> Result<Approval, ApiError> {
        let notes = req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if notes.is_none() {
            return Err(ApiError::field("notes", "A reason is required when rejecting"));
        }
        self.decide(admin, id, ApprovalStatus::Rejected, notes).await
    }

    async fn decide(
        &self,
        admin: &AuthUser,
        id: Uuid,
        decision: ApprovalStatus,
        notes: Option<String>,
    ) -> Result<Approval, ApiError> {
        let mut tx = self.pool.begin().await?;

        let before = sqlx::query_as::<_, Approval>("SELECT * FROM approvals WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Approval not found"))?;

        let mut after = before.clone();
        after.decide(decision, admin.user_id, notes, Utc::now())?;

        let approval = sqlx::query_as::<_, Approval>(
            "UPDATE approvals SET status = $2, reviewer_id = $3, notes = $4, reviewed_at = $5, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(after.status)
        .bind(after.reviewer_id)
        .bind(&after.notes)
        .bind(after.reviewed_at)
        .fetch_one(&mut *tx)
        .await?;

        apply_decision(&mut *tx, &approval).await?;
        tx.commit().await?;

        let ctx = ObserverContext::new(schema::APPROVALS, Record::for_update(&before, &approval)?)
            .with_actor(admin.user_id)
            .with_pool(self.pool.clone());
        super::finish(ctx).await;

        tracing::info!(
            approval_id = %approval.id,
            item_kind = approval.item_kind.as_str(),
            decision = approval.status.as_str(),
            reviewer_id = %admin.user_id,
            "Approval decided"
        );
        Ok(approval)
    }
}

/// Publish or hold back the item, inside the deciding transaction
async fn apply_decision(conn: &mut PgConnection, approval: &Approval) -> Result<(), ApiError> {
    let approved = approval.status == ApprovalStatus::Approved;
    match approval.item_kind {
        ApprovalItemKind::Seller => {
            let seller = sqlx::query_as::<_, Seller>("SELECT * FROM esm_sellers WHERE id = $1 FOR UPDATE")
                .bind(approval.item_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| ApiError::not_found("Seller under review no longer exists"))?;
            let next = if approved { SellerStatus::Active } else { SellerStatus::Rejected };
            super::sellers::apply_status(conn, &seller, next, approval.notes.as_deref()).await?;
        }
        ApprovalItemKind::Product => {
            let result = sqlx::query(
                "UPDATE esm_products SET is_approved = $2, rejection_reason = $3, updated_at = NOW() WHERE id = $1",
            )
            .bind(approval.item_id)
            .bind(approved)
            .bind(if approved { None } else { approval.notes.as_deref() })
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                return Err(ApiError::not_found("Product under review no longer exists"));
            }
        }
        ApprovalItemKind::TravelListing => {
            let result =
                sqlx::query("UPDATE travel_listings SET is_active = $2, updated_at = NOW() WHERE id = $1")
                    .bind(approval.item_id)
                    .bind(approved)
                    .execute(&mut *conn)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(ApiError::not_found("Listing under review no longer exists"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_queue_is_oldest_first() {
        let filter = ApprovalListQuery {
            status: Some(ApprovalStatus::Pending),
            item_kind: Some(ApprovalItemKind::Product),
            ..Default::default()
        }
        .to_filter();
        assert_eq!(filter.order, Some(json!("created_at asc")));
        let clause = filter.where_clause.unwrap();
        assert_eq!(clause["status"], json!("pending"));
        assert_eq!(clause["item_kind"], json!("product"));
    }

    #[test]
    fn decided_history_is_newest_first() {
        let filter = ApprovalListQuery {
            status: Some(ApprovalStatus::Rejected),
            ..Default::default()
        }
        .to_filter();
        assert_eq!(filter.order, Some(json!("reviewed_at desc")));
    }
}
