// handlers/public/auth/login.rs - POST /auth/login handler

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::users::{AuthSession, LoginRequest};
use crate::services::UserService;

/**
 * POST /auth/login - Authenticate and receive a JWT
 *
 * Input: `{ "email": "...", "password": "..." }`
 *
 * Output: `{ token, expires_in, user }`. Bad credentials are 401 without
 * saying which half was wrong; a deactivated account is 403.
 */
pub async fn login_post(payload: Result<Json<LoginRequest>, JsonRejection>) -> ApiResult<AuthSession> {
    let Json(req) = payload?;
    let session = UserService::new().await?.login(req).await?;
    Ok(ApiResponse::success(session))
}
