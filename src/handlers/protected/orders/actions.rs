// handlers/protected/orders/actions.rs - POST /api/orders/:id/<action>
//
// confirm, process, ship, deliver, complete, cancel, refund, payment.
// Who may take which step is decided by the order service; an illegal
// transition or a stale version is 409.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::handlers::body_or_default;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::Order;
use crate::services::orders::{CancelRequest, NoteRequest, PaymentRequest, TrackingRequest};
use crate::services::OrderService;

pub async fn order_confirm(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let Path(id) = id?;
    let req = body_or_default(payload)?;
    Ok(ApiResponse::success(OrderService::new().await?.confirm(&user, id, req).await?))
}

pub async fn order_process(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let Path(id) = id?;
    let req = body_or_default(payload)?;
    Ok(ApiResponse::success(OrderService::new().await?.process(&user, id, req).await?))
}

/// Tracking details are required to ship
pub async fn order_ship(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<TrackingRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let Path(id) = id?;
    let Json(req) = payload?;
    Ok(ApiResponse::success(OrderService::new().await?.add_tracking(&user, id, req).await?))
}

pub async fn order_deliver(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let Path(id) = id?;
    let req = body_or_default(payload)?;
    Ok(ApiResponse::success(OrderService::new().await?.mark_delivered(&user, id, req).await?))
}

pub async fn order_complete(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let Path(id) = id?;
    let req = body_or_default(payload)?;
    Ok(ApiResponse::success(OrderService::new().await?.complete(&user, id, req).await?))
}

pub async fn order_cancel(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CancelRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let Path(id) = id?;
    let req = body_or_default(payload)?;
    Ok(ApiResponse::success(OrderService::new().await?.cancel(&user, id, req).await?))
}

pub async fn order_refund(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let Path(id) = id?;
    let req = body_or_default(payload)?;
    Ok(ApiResponse::success(OrderService::new().await?.refund(&user, id, req).await?))
}

pub async fn order_payment(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let Path(id) = id?;
    let Json(req) = payload?;
    Ok(ApiResponse::success(OrderService::new().await?.record_payment(&user, id, req).await?))
}
