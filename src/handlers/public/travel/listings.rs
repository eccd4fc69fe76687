// handlers/public/travel/listings.rs - GET /api/travel/listings[/:id_or_slug]

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query};
use axum::http::HeaderMap;

use crate::middleware::{optional_user, ApiResponse, ApiResult};
use crate::models::{Page, TravelListing};
use crate::services::travel::ListingQuery;
use crate::services::TravelService;

/// Active listings; `destination`, `min_price`, `max_price`, `min_rating`, paging
pub async fn listing_list(query: Result<Query<ListingQuery>, QueryRejection>) -> ApiResult<Page<TravelListing>> {
    let Query(query) = query?;
    let page = TravelService::new().await?.list_listings(query).await?;
    Ok(ApiResponse::success(page))
}

pub async fn listing_get(headers: HeaderMap, Path(id_or_slug): Path<String>) -> ApiResult<TravelListing> {
    let viewer = optional_user(&headers);
    let listing = TravelService::new()
        .await?
        .get_listing(&id_or_slug, viewer.as_ref())
        .await?;
    Ok(ApiResponse::success(listing))
}
