// handlers/protected/orders/mod.rs - Order placement and lifecycle
//
// POST /api/orders                 place an order (single seller)
// GET  /api/orders?as=buyer|seller list
// GET  /api/orders/:id             buyer, seller or admin
// POST /api/orders/:id/<action>    see `actions`

pub mod actions;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Order, Page};
use crate::services::orders::{CreateOrderRequest, OrderListQuery};
use crate::services::OrderService;

pub async fn order_create(
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let Json(req) = payload?;
    let order = OrderService::new().await?.create_order(&user, req).await?;
    Ok(ApiResponse::created(order))
}

pub async fn order_list(
    Extension(user): Extension<AuthUser>,
    query: Result<Query<OrderListQuery>, QueryRejection>,
) -> ApiResult<Page<Order>> {
    let Query(query) = query?;
    let page = OrderService::new().await?.list_orders(&user, query).await?;
    Ok(ApiResponse::success(page))
}

pub async fn order_get(Extension(user): Extension<AuthUser>, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<Order> {
    let Path(id) = id?;
    let order = OrderService::new().await?.get_order(&user, id).await?;
    Ok(ApiResponse::success(order))
}
