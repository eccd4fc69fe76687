// handlers/elevated/admin/users.rs - User administration

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Page, User};
use crate::services::users::{SetActiveRequest, UserListQuery};
use crate::services::UserService;

pub async fn user_list(query: Result<Query<UserListQuery>, QueryRejection>) -> ApiResult<Page<User>> {
    let Query(query) = query?;
    let page = UserService::new().await?.list_users(query).await?;
    Ok(ApiResponse::success(page))
}

pub async fn user_active(
    Extension(admin): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<SetActiveRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let user = UserService::new().await?.set_active(&admin, id, req.is_active).await?;
    Ok(ApiResponse::success(user))
}
