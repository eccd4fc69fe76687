// handlers/protected/auth/password.rs - PUT /api/auth/password handler

use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::users::ChangePasswordRequest;
use crate::services::UserService;

pub async fn password_put(
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(req) = payload?;
    UserService::new().await?.change_password(&user, req).await?;
    Ok(ApiResponse::success(json!({ "changed": true })))
}
