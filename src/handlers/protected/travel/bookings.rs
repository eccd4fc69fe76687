// handlers/protected/travel/bookings.rs - Booking lifecycle
//
// POST /api/bookings
// GET  /api/bookings/mine, /api/bookings/hosted, /api/bookings/:id
// POST /api/bookings/:id/{confirm,cancel,complete}

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::handlers::body_or_default;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Booking, Page};
use crate::services::travel::{BookingListQuery, BookingNoteRequest, BookingRequest};
use crate::services::TravelService;

pub async fn booking_create(
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> ApiResult<Booking> {
    let Json(req) = payload?;
    let booking = TravelService::new().await?.create_booking(&user, req).await?;
    Ok(ApiResponse::created(booking))
}

pub async fn booking_mine(
    Extension(user): Extension<AuthUser>,
    query: Result<Query<BookingListQuery>, QueryRejection>,
) -> ApiResult<Page<Booking>> {
    let Query(query) = query?;
    let page = TravelService::new().await?.my_bookings(&user, query).await?;
    Ok(ApiResponse::success(page))
}

/// Bookings on listings the caller hosts
pub async fn booking_hosted(
    Extension(user): Extension<AuthUser>,
    query: Result<Query<BookingListQuery>, QueryRejection>,
) -> ApiResult<Page<Booking>> {
    let Query(query) = query?;
    let page = TravelService::new().await?.host_bookings(&user, query).await?;
    Ok(ApiResponse::success(page))
}

pub async fn booking_get(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Booking> {
    let Path(id) = id?;
    let booking = TravelService::new().await?.get_booking(&user, id).await?;
    Ok(ApiResponse::success(booking))
}

pub async fn booking_confirm(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<BookingNoteRequest>, JsonRejection>,
) -> ApiResult<Booking> {
    let Path(id) = id?;
    let req = body_or_default(payload)?;
    let booking = TravelService::new().await?.confirm_booking(&user, id, req).await?;
    Ok(ApiResponse::success(booking))
}

pub async fn booking_cancel(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<BookingNoteRequest>, JsonRejection>,
) -> ApiResult<Booking> {
    let Path(id) = id?;
    let req = body_or_default(payload)?;
    let booking = TravelService::new().await?.cancel_booking(&user, id, req).await?;
    Ok(ApiResponse::success(booking))
}

pub async fn booking_complete(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<BookingNoteRequest>, JsonRejection>,
) -> ApiResult<Booking> {
    let Path(id) = id?;
    let req = body_or_default(payload)?;
    let booking = TravelService::new().await?.complete_booking(&user, id, req).await?;
    Ok(ApiResponse::success(booking))
}
