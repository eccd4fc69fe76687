// handlers/elevated/admin/approvals.rs - Moderation queue

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::handlers::body_or_default;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Approval, Page};
use crate::services::approvals::{ApprovalDetail, ApprovalListQuery, DecisionRequest};
use crate::services::ApprovalService;

/// `?status=pending|approved|rejected&item_kind=seller|product|travel_listing`
pub async fn approval_list(query: Result<Query<ApprovalListQuery>, QueryRejection>) -> ApiResult<Page<Approval>> {
    let Query(query) = query?;
    let page = ApprovalService::new().await?.list_approvals(query).await?;
    Ok(ApiResponse::success(page))
}

pub async fn approval_get(id: Result<Path<Uuid>, PathRejection>) -> ApiResult<ApprovalDetail> {
    let Path(id) = id?;
    let detail = ApprovalService::new().await?.get_approval(id).await?;
    Ok(ApiResponse::success(detail))
}

pub async fn approval_approve(
    Extension(admin): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> ApiResult<Approval> {
    let Path(id) = id?;
    let req = body_or_default(payload)?;
    let approval = ApprovalService::new().await?.approve(&admin, id, req).await?;
    Ok(ApiResponse::success(approval))
}

/// Notes are required when rejecting
pub async fn approval_reject(
    Extension(admin): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> ApiResult<Approval> {
    let Path(id) = id?;
    let req = body_or_default(payload)?;
    let approval = ApprovalService::new().await?.reject(&admin, id, req).await?;
    Ok(ApiResponse::success(approval))
}
