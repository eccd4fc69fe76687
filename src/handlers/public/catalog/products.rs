// handlers/public/catalog/products.rs - GET /api/catalog/products[/:id_or_slug]

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query};
use axum::http::HeaderMap;

use crate::middleware::{optional_user, ApiResponse, ApiResult};
use crate::models::{Page, Product};
use crate::services::products::CatalogQuery;
use crate::services::ProductService;

/**
 * GET /api/catalog/products - Approved products only
 *
 * Query: `category`, `min_price`, `max_price`, `q`, `seller_id`,
 * `sort` (newest | price_asc | price_desc | name), `limit`, `offset`.
 */
pub async fn product_list(query: Result<Query<CatalogQuery>, QueryRejection>) -> ApiResult<Page<Product>> {
    let Query(query) = query?;
    let page = ProductService::new().await?.list_products(query).await?;
    Ok(ApiResponse::success(page))
}

/// The owner and admins can also open products still awaiting approval.
pub async fn product_get(headers: HeaderMap, Path(id_or_slug): Path<String>) -> ApiResult<Product> {
    let viewer = optional_user(&headers);
    let product = ProductService::new()
        .await?
        .get_product(&id_or_slug, viewer.as_ref())
        .await?;
    Ok(ApiResponse::success(product))
}
