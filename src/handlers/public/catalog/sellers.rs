// handlers/public/catalog/sellers.rs - GET /api/catalog/sellers[/:id[/contact]]

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::http::HeaderMap;
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::{optional_user, ApiResponse, ApiResult};
use crate::models::Page;
use crate::services::sellers::{ContactQuery, SellerContact, SellerListQuery};
use crate::services::SellerService;

/// Active sellers, public fields only
pub async fn seller_list(query: Result<Query<SellerListQuery>, QueryRejection>) -> ApiResult<Page<Value>> {
    let Query(query) = query?;
    let page = SellerService::new().await?.list_sellers(query, false).await?;
    Ok(ApiResponse::success(page))
}

pub async fn seller_get(headers: HeaderMap, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<Value> {
    let Path(id) = id?;
    let viewer = optional_user(&headers);
    let seller = SellerService::new().await?.get_seller(id, viewer.as_ref()).await?;
    Ok(ApiResponse::success(seller))
}

/**
 * GET /api/catalog/sellers/:id/contact - WhatsApp and mailto links
 *
 * `?product_id=` puts the product name into the prefilled message.
 */
pub async fn seller_contact(
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ContactQuery>, QueryRejection>,
) -> ApiResult<SellerContact> {
    let Path(id) = id?;
    let Query(query) = query?;
    let contact = SellerService::new().await?.seller_contact(id, query).await?;
    Ok(ApiResponse::success(contact))
}
