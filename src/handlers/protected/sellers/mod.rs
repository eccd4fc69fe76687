// handlers/protected/sellers/mod.rs - Seller onboarding
//
// POST /api/sellers       register a seller profile (queued for approval)
// GET  /api/sellers/me    own profile, any status
// PUT  /api/sellers/me    edit; a rejected profile is resubmitted

use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::Seller;
use crate::services::sellers::SellerRequest;
use crate::services::SellerService;

pub async fn seller_register(
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<SellerRequest>, JsonRejection>,
) -> ApiResult<Seller> {
    let Json(req) = payload?;
    let seller = SellerService::new().await?.register_seller(&user, req).await?;
    Ok(ApiResponse::created(seller))
}

pub async fn seller_me(Extension(user): Extension<AuthUser>) -> ApiResult<Seller> {
    let seller = SellerService::new().await?.my_seller_profile(&user).await?;
    Ok(ApiResponse::success(seller))
}

pub async fn seller_update(
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<SellerRequest>, JsonRejection>,
) -> ApiResult<Seller> {
    let Json(req) = payload?;
    let seller = SellerService::new().await?.update_seller(&user, req).await?;
    Ok(ApiResponse::success(seller))
}
