use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::config::config;
use crate::database::{DatabaseError, DatabaseManager, Record};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::conversation::{conversation_key, sorted_pair};
use crate::models::{Conversation, LatestMessage, Message, Page, Paging};
use crate::observer::ObserverContext;
use crate::types::schema;
use crate::validation::{Validate, ValidationErrors};

const MAX_ATTACHMENTS: usize = 5;

/// Unread count of a conversation for one reader, computed in SQL
const UNREAD_FOR_READER: &str = "(SELECT COUNT(*) FROM messages m \
     WHERE m.conversation_id = c.id AND m.sender_id <> $1 \
     AND m.created_at > COALESCE((c.last_read ->> $2)::timestamptz, '-infinity'::timestamptz))";

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub recipient_id: Uuid,
    #[serde(default)]
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl Validate for SendMessageRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_text("body", &self.body, 1, config().messaging.max_message_length);
        errors.upload_paths("attachments", &self.attachments, MAX_ATTACHMENTS);
        errors.finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// A conversation as seen by one participant
#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_participant: Option<Uuid>,
    pub unread_count: i64,
}

#[derive(Debug, FromRow)]
struct ConversationRow {
    #[sqlx(flatten)]
    conversation: Conversation,
    unread_count: i64,
}

impl ConversationRow {
    fn into_summary(self, reader: Uuid) -> ConversationSummary {
        ConversationSummary {
            other_participant: self.conversation.other_participant(reader),
            conversation: self.conversation,
            unread_count: self.unread_count,
        }
    }
}

/// One polling response: messages in ascending order plus the cursor for
/// the next poll
#[derive(Debug, Serialize)]
pub struct MessagePoll {
    pub messages: Vec<Message>,
    pub next_since: Option<DateTime<Utc>>,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct UnreadTotal {
    pub unread: i64,
}

pub struct ConversationService {
    pool: PgPool,
}

impl ConversationService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open (or reopen) the thread with another user. There is one thread per
    /// pair of users; the optional first message is sent in the same transaction.
    pub async fn start_conversation(
        &self,
        user: &AuthUser,
        req: StartConversationRequest,
    ) -> Result<ConversationSummary, ApiError> {
        if req.recipient_id == user.user_id {
            return Err(ApiError::unprocessable("You cannot start a conversation with yourself"));
        }
        let first_message = match req.message {
            Some(body) => {
                let msg = SendMessageRequest { body, attachments: vec![] };
                msg.validate()?;
                Some(msg)
            }
            None => None,
        };

        let recipient_active =
            sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = $1")
                .bind(req.recipient_id)
                .fetch_optional(&self.pool)
                .await?;
        if recipient_active != Some(true) {
            return Err(ApiError::not_found("Recipient not found"));
        }
        if let Some(product_id) = req.product_id {
            let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM esm_products WHERE id = $1)")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;
            if !exists {
                return Err(ApiError::not_found("Product not found"));
            }
        }

        let (low, high) = sorted_pair(user.user_id, req.recipient_id);
        let mut tx = self.pool.begin().await?;
        let conversation = sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (id, conversation_key, participants, product_id) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (conversation_key) DO UPDATE \
             SET product_id = COALESCE(EXCLUDED.product_id, conversations.product_id) \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(conversation_key(low, high))
        .bind(vec![low, high])
        .bind(req.product_id)
        .fetch_one(&mut *tx)
        .await?;

        let sent = match first_message {
            Some(msg) => Some(append_message(&mut *tx, &conversation, user.user_id, msg).await?),
            None => None,
        };
        tx.commit().await?;

        if let Some(message) = sent {
            audit_message(&self.pool, user, &message).await?;
        }
        self.get_conversation(user, conversation.id).await
    }

    /// The caller's threads, most recent activity first
    pub async fn list_conversations(
        &self,
        user: &AuthUser,
        paging: Paging,
    ) -> Result<Page<ConversationSummary>, ApiError> {
        let (limit, offset) = paging.resolve();
        let sql = format!(
            "SELECT c.*, {} AS unread_count FROM conversations c \
             WHERE $1 = ANY(c.participants) \
             ORDER BY COALESCE((c.latest_message ->> 'sent_at')::timestamptz, c.updated_at) DESC \
             LIMIT $3 OFFSET $4",
            UNREAD_FOR_READER
        );
        let rows = sqlx::query_as::<_, ConversationRow>(&sql)
            .bind(user.user_id)
            .bind(user.user_id.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversations WHERE $1 = ANY(participants)")
            .bind(user.user_id)
            .fetch_one(&self.pool)
            .await?;

        let items = rows.into_iter().map(|r| r.into_summary(user.user_id)).collect();
        Ok(Page::new(items, total, limit, offset))
    }

    /// Threads the caller is not part of are reported as missing
    pub async fn get_conversation(&self, user: &AuthUser, id: Uuid) -> Result<ConversationSummary, ApiError> {
        let sql = format!(
            "SELECT c.*, {} AS unread_count FROM conversations c \
             WHERE c.id = $3 AND $1 = ANY(c.participants)",
            UNREAD_FOR_READER
        );
        let row = sqlx::query_as::<_, ConversationRow>(&sql)
            .bind(user.user_id)
            .bind(user.user_id.to_string())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Conversation not found"))?;
        Ok(row.into_summary(user.user_id))
    }

    pub async fn send_message(&self, user: &AuthUser, id: Uuid, req: SendMessageRequest) -> Result<Message, ApiError> {
        req.validate()?;
        let conversation = self.participant_conversation(user, id).await?;

        let mut tx = self.pool.begin().await?;
        let message = append_message(&mut *tx, &conversation, user.user_id, req).await?;
        tx.commit().await?;

        audit_message(&self.pool, user, &message).await?;
        Ok(message)
    }

    /// Polling endpoint. With `since`, returns what arrived after it; without,
    /// the latest page. Always oldest first.
    pub async fn list_messages(&self, user: &AuthUser, id: Uuid, query: MessageQuery) -> Result<MessagePoll, ApiError> {
        self.participant_conversation(user, id).await?;
        let messaging = &config().messaging;
        let limit = query.limit.unwrap_or(messaging.max_page_size).clamp(1, messaging.max_page_size);

        let messages = match query.since {
            Some(since) => {
                sqlx::query_as::<_, Message>(
                    "SELECT * FROM messages WHERE conversation_id = $1 AND created_at > $2 \
                     ORDER BY created_at ASC LIMIT $3",
                )
                .bind(id)
                .bind(since)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Message>(
                    "SELECT * FROM (SELECT * FROM messages WHERE conversation_id = $1 \
                     ORDER BY created_at DESC LIMIT $2) latest ORDER BY created_at ASC",
                )
                .bind(id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let next_since = messages.last().map(|m| m.created_at).or(query.since);
        Ok(MessagePoll {
            messages,
            next_since,
            poll_interval_secs: messaging.poll_interval_secs,
        })
    }

    pub async fn mark_read(&self, user: &AuthUser, id: Uuid) -> Result<ConversationSummary, ApiError> {
        // Same clock as message timestamps
        let updated = sqlx::query(
            "UPDATE conversations SET last_read = last_read || jsonb_build_object($3::text, clock_timestamp()) \
             WHERE id = $1 AND $2 = ANY(participants)",
        )
        .bind(id)
        .bind(user.user_id)
        .bind(user.user_id.to_string())
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(ApiError::not_found("Conversation not found"));
        }
        self.get_conversation(user, id).await
    }

    pub async fn unread_total(&self, user: &AuthUser) -> Result<UnreadTotal, ApiError> {
        let sql = format!(
            "SELECT COALESCE(SUM({}), 0)::bigint FROM conversations c WHERE $1 = ANY(c.participants)",
            UNREAD_FOR_READER
        );
        let unread = sqlx::query_scalar::<_, i64>(&sql)
            .bind(user.user_id)
            .bind(user.user_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(UnreadTotal { unread })
    }

    async fn participant_conversation(&self, user: &AuthUser, id: Uuid) -> Result<Conversation, ApiError> {
        sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .filter(|c| c.has_participant(user.user_id))
            .ok_or_else(|| ApiError::not_found("Conversation not found"))
    }
}

/// Store a message and move the thread's snapshot and the sender's read marker
async fn append_message(
    conn: &mut PgConnection,
    conversation: &Conversation,
    sender_id: Uuid,
    req: SendMessageRequest,
) -> Result<Message, ApiError> {
    // Writers to one thread are serialized on its row and stamped after the
    // lock: created_at order is commit order for the polling cursor
    sqlx::query("SELECT id FROM conversations WHERE id = $1 FOR UPDATE")
        .bind(conversation.id)
        .execute(&mut *conn)
        .await?;

    let message = sqlx::query_as::<_, Message>(
        "INSERT INTO messages (id, conversation_id, sender_id, body, attachments, created_at) \
         VALUES ($1, $2, $3, $4, $5, clock_timestamp()) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(conversation.id)
    .bind(sender_id)
    .bind(req.body.trim())
    .bind(&req.attachments)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE conversations SET latest_message = $2, last_read = last_read || $3, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(conversation.id)
    .bind(Json(LatestMessage::from_message(&message)))
    .bind(read_marker(sender_id, message.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(message)
}

/// `{user_id: at}`, merged into `last_read` with `||`
fn read_marker(user_id: Uuid, at: DateTime<Utc>) -> Json<serde_json::Value> {
    let mut marker = serde_json::Map::new();
    marker.insert(user_id.to_string(), json!(at));
    Json(serde_json::Value::Object(marker))
}

async fn audit_message(pool: &PgPool, user: &AuthUser, message: &Message) -> Result<(), ApiError> {
    let ctx = ObserverContext::new(schema::MESSAGES, Record::for_create(message)?)
        .with_actor(user.user_id)
        .with_pool(pool.clone());
    super::finish(ctx).await;
    Ok(())
}
