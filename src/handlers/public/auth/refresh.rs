// handlers/public/auth/refresh.rs - POST /auth/refresh handler

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::users::{AuthSession, RefreshRequest};
use crate::services::UserService;

pub async fn refresh_post(payload: Result<Json<RefreshRequest>, JsonRejection>) -> ApiResult<AuthSession> {
    let Json(req) = payload?;
    let session = UserService::new().await?.refresh(req).await?;
    Ok(ApiResponse::success(session))
}
