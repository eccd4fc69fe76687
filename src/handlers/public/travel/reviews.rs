// handlers/public/travel/reviews.rs - GET /api/travel/listings/:id/reviews

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{Page, Paging, TravelReview};
use crate::services::TravelService;

pub async fn review_list(
    id: Result<Path<Uuid>, PathRejection>,
    paging: Result<Query<Paging>, QueryRejection>,
) -> ApiResult<Page<TravelReview>> {
    let Path(listing_id) = id?;
    let Query(paging) = paging?;
    let page = TravelService::new().await?.list_reviews(listing_id, paging).await?;
    Ok(ApiResponse::success(page))
}
