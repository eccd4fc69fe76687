// handlers/protected/conversations/mod.rs - Buyer/seller messaging
//
// GET  /api/conversations                 threads with unread counts
// POST /api/conversations                 start or reopen a thread
// GET  /api/conversations/unread          total unread for the badge
// GET  /api/conversations/:id
// GET  /api/conversations/:id/messages    polling, `?since=` for new only
// POST /api/conversations/:id/messages
// POST /api/conversations/:id/read

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Message, Page, Paging};
use crate::services::conversations::{
    ConversationSummary, MessagePoll, MessageQuery, SendMessageRequest, StartConversationRequest, UnreadTotal,
};
use crate::services::ConversationService;

pub async fn conversation_list(
    Extension(user): Extension<AuthUser>,
    paging: Result<Query<Paging>, QueryRejection>,
) -> ApiResult<Page<ConversationSummary>> {
    let Query(paging) = paging?;
    let page = ConversationService::new().await?.list_conversations(&user, paging).await?;
    Ok(ApiResponse::success(page))
}

/// Same pair and product always lands in the same thread
pub async fn conversation_start(
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<StartConversationRequest>, JsonRejection>,
) -> ApiResult<ConversationSummary> {
    let Json(req) = payload?;
    let conversation = ConversationService::new().await?.start_conversation(&user, req).await?;
    Ok(ApiResponse::created(conversation))
}

pub async fn conversation_unread(Extension(user): Extension<AuthUser>) -> ApiResult<UnreadTotal> {
    let total = ConversationService::new().await?.unread_total(&user).await?;
    Ok(ApiResponse::success(total))
}

pub async fn conversation_get(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<ConversationSummary> {
    let Path(id) = id?;
    let conversation = ConversationService::new().await?.get_conversation(&user, id).await?;
    Ok(ApiResponse::success(conversation))
}

pub async fn message_list(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<MessageQuery>, QueryRejection>,
) -> ApiResult<MessagePoll> {
    let Path(id) = id?;
    let Query(query) = query?;
    let poll = ConversationService::new().await?.list_messages(&user, id, query).await?;
    Ok(ApiResponse::success(poll))
}

pub async fn message_send(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiResult<Message> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let message = ConversationService::new().await?.send_message(&user, id, req).await?;
    Ok(ApiResponse::created(message))
}

pub async fn conversation_read(
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<ConversationSummary> {
    let Path(id) = id?;
    let conversation = ConversationService::new().await?.mark_read(&user, id).await?;
    Ok(ApiResponse::success(conversation))
}
