// handlers/protected/products/mod.rs - Seller product management
//
// POST   /api/products             create (unapproved, queued)
// GET    /api/products/mine        caller's products, any approval state
// PUT    /api/products/:id         partial edit
// DELETE /api/products/:id         refused while an open order references it
// POST   /api/products/:id/stock   `{ "delta": n }`

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Page, Product};
use crate::services::products::{MyProductsQuery, ProductRequest, StockRequest, UpdateProductRequest};
use crate::services::ProductService;

pub async fn product_create(
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> ApiResult<Product> {
    let Json(req) = payload?;
    let product = ProductService::new().await?.create_product(&user, req).await?;
    Ok(ApiResponse::created(product))
}

pub async fn product_mine(
    Extension(user): Extension<AuthUser>,
    query: Result<Query<MyProductsQuery>, QueryRejection>,
) -> ApiResult<Page<Product>> {
    let Query(query) = query?;
    let page = ProductService::new().await?.my_products(&user, query).await?;
    Ok(ApiResponse::success(page))
}

pub async fn product_update(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> ApiResult<Product> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let product = ProductService::new().await?.update_product(&user, id, req).await?;
    Ok(ApiResponse::success(product))
}

pub async fn product_delete(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = id?;
    ProductService::new().await?.delete_product(&user, id).await?;
    Ok(ApiResponse::<()>::no_content())
}

pub async fn product_stock(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<StockRequest>, JsonRejection>,
) -> ApiResult<Product> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let product = ProductService::new().await?.adjust_stock(&user, id, req.delta).await?;
    Ok(ApiResponse::success(product))
}
