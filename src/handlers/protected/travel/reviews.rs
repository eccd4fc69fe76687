// handlers/protected/travel/reviews.rs - Review writes

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::TravelReview;
use crate::services::travel::ReviewRequest;
use crate::services::TravelService;

/// POST /api/travel/listings/:id/reviews - needs a completed booking
pub async fn review_create(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> ApiResult<TravelReview> {
    let Path(listing_id) = id?;
    let Json(req) = payload?;
    let review = TravelService::new().await?.create_review(&user, listing_id, req).await?;
    Ok(ApiResponse::created(review))
}

pub async fn review_update(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> ApiResult<TravelReview> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let review = TravelService::new().await?.update_review(&user, id, req).await?;
    Ok(ApiResponse::success(review))
}

pub async fn review_delete(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = id?;
    TravelService::new().await?.delete_review(&user, id).await?;
    Ok(ApiResponse::<()>::no_content())
}
