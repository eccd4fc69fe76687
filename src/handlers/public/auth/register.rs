// handlers/public/auth/register.rs - POST /auth/register handler

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::users::{AuthSession, RegisterRequest};
use crate::services::UserService;

/// New accounts start as buyers and are signed in straight away.
pub async fn register_post(payload: Result<Json<RegisterRequest>, JsonRejection>) -> ApiResult<AuthSession> {
    let Json(req) = payload?;
    let session = UserService::new().await?.register(req).await?;
    Ok(ApiResponse::created(session))
}
