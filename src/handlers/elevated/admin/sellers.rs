// handlers/elevated/admin/sellers.rs - Seller administration

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Page, Seller};
use crate::services::sellers::{SellerListQuery, SetSellerStatusRequest};
use crate::services::SellerService;

/// Full profiles in every status
pub async fn seller_list(query: Result<Query<SellerListQuery>, QueryRejection>) -> ApiResult<Page<Value>> {
    let Query(query) = query?;
    let page = SellerService::new().await?.list_sellers(query, true).await?;
    Ok(ApiResponse::success(page))
}

/// POST /api/admin/sellers/:id/status - `{ "status": "suspended", "reason": "..." }`
pub async fn seller_status(
    Extension(admin): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<SetSellerStatusRequest>, JsonRejection>,
) -> ApiResult<Seller> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let seller = SellerService::new().await?.set_seller_status(&admin, id, req).await?;
    Ok(ApiResponse::success(seller))
}
