// handlers/protected/travel/listings.rs - Listing create and edit

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::TravelListing;
use crate::services::travel::{ListingRequest, UpdateListingRequest};
use crate::services::TravelService;

/**
 * POST /api/travel/listings
 *
 * Active sellers create listings that wait for approval. Admin listings
 * are published immediately.
 */
pub async fn listing_create(
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ListingRequest>, JsonRejection>,
) -> ApiResult<TravelListing> {
    let Json(req) = payload?;
    let listing = TravelService::new().await?.create_listing(&user, req).await?;
    Ok(ApiResponse::created(listing))
}

pub async fn listing_update(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateListingRequest>, JsonRejection>,
) -> ApiResult<TravelListing> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let listing = TravelService::new().await?.update_listing(&user, id, req).await?;
    Ok(ApiResponse::success(listing))
}
