// handlers/public/find/find_post.rs - POST /api/find/products handler

use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::Json;

use crate::filter::FilterData;
use crate::middleware::{optional_user, ApiResponse, ApiResult};
use crate::models::{Page, Product};
use crate::services::ProductService;

/**
 * POST /api/find/products - advanced filtered find
 *
 * Body is the filter DSL: `{ "where": {...}, "order": ..., "limit": n, "offset": n }`.
 * Anonymous callers and non-admins only ever match approved products.
 */
pub async fn find_post(
    headers: HeaderMap,
    payload: Result<Json<FilterData>, JsonRejection>,
) -> ApiResult<Page<Product>> {
    let Json(filter) = payload?;
    let viewer = optional_user(&headers);
    let page = ProductService::new()
        .await?
        .find_products(filter, viewer.as_ref())
        .await?;
    Ok(ApiResponse::success(page))
}
