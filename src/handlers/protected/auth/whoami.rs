// handlers/protected/auth/whoami.rs - GET /api/auth/whoami handler

use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::User;
use crate::services::UserService;

/**
 * GET /api/auth/whoami - Current user, read fresh from the database
 *
 * The token only carries id, email and role; the row may have changed
 * (deactivation, seller promotion) since it was issued.
 */
pub async fn whoami_get(Extension(user): Extension<AuthUser>) -> ApiResult<User> {
    let profile = UserService::new().await?.whoami(&user).await?;
    Ok(ApiResponse::success(profile))
}
