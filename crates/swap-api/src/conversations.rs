use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use swap_core::metrics;
use utoipa::ToSchema;

use crate::{now_millis, ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartConversationRequest {
    pub post_id: Option<i64>,
    pub buyer_id: Option<i64>,
    pub seller_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: Option<i64>,
    pub sender_id: Option<i64>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    pub current_user_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Conversation {
    pub id: i64,
    pub post_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationSummary {
    pub id: i64,
    pub post_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub post_title: String,
    pub post_price: f64,
    pub post_image: Option<String>,
    pub seller_name: String,
    pub buyer_name: String,
    pub last_message: Option<String>,
    pub last_message_time: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: i64,
    pub sender_name: String,
}

const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.sender_id, m.message, m.is_read, \
     m.created_at, u.username AS sender_name";

fn map_conversation(row: &SqliteRow) -> Result<Conversation, sqlx::Error> {
    Ok(Conversation {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        buyer_id: row.try_get("buyer_id")?,
        seller_id: row.try_get("seller_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_message(row: &SqliteRow) -> Result<Message, sqlx::Error> {
    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender_id: row.try_get("sender_id")?,
        message: row.try_get("message")?,
        is_read: row.try_get::<i64, _>("is_read")? != 0,
        created_at: row.try_get("created_at")?,
        sender_name: row.try_get("sender_name")?,
    })
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_foreign_key_violation())
        .unwrap_or(false)
}

pub async fn start_conversation(
    State(state): State<AppState>,
    Json(payload): Json<StartConversationRequest>,
) -> ApiResult<Json<Value>> {
    let (Some(post_id), Some(buyer_id), Some(seller_id)) =
        (payload.post_id, payload.buyer_id, payload.seller_id)
    else {
        return Err(ApiError::bad_request(
            "postId, buyerId and sellerId are required",
        ));
    };

    let now = now_millis();
    let inserted = sqlx::query(
        "INSERT INTO conversations (post_id, buyer_id, seller_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?) ON CONFLICT (post_id, buyer_id) DO NOTHING",
    )
    .bind(post_id)
    .bind(buyer_id)
    .bind(seller_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|err| {
        if is_foreign_key_violation(&err) {
            ApiError::not_found("Post or user not found")
        } else {
            err.into()
        }
    })?;

    let row = sqlx::query(
        "SELECT id, post_id, buyer_id, seller_id, created_at, updated_at \
         FROM conversations WHERE post_id = ? AND buyer_id = ?",
    )
    .bind(post_id)
    .bind(buyer_id)
    .fetch_one(&state.pool)
    .await?;
    let conversation = map_conversation(&row)?;

    if inserted.rows_affected() > 0 {
        tracing::info!(conversation_id = conversation.id, post_id, buyer_id, "conversation started");
    }

    Ok(Json(json!({ "success": true, "conversation": conversation })))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let rows = sqlx::query(
        "SELECT c.id, c.post_id, c.buyer_id, c.seller_id, c.created_at, c.updated_at, \
                p.title AS post_title, p.price AS post_price, p.primary_image_url AS post_image, \
                s.username AS seller_name, b.username AS buyer_name, \
                (SELECT m.message FROM messages m WHERE m.conversation_id = c.id \
                 ORDER BY m.created_at DESC, m.id DESC LIMIT 1) AS last_message, \
                (SELECT m.created_at FROM messages m WHERE m.conversation_id = c.id \
                 ORDER BY m.created_at DESC, m.id DESC LIMIT 1) AS last_message_time \
         FROM conversations c \
         JOIN posts p ON c.post_id = p.id \
         JOIN users s ON c.seller_id = s.id \
         JOIN users b ON c.buyer_id = b.id \
         WHERE c.buyer_id = ? OR c.seller_id = ? \
         ORDER BY c.updated_at DESC, c.id DESC",
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    let mut conversations = Vec::with_capacity(rows.len());
    for row in &rows {
        conversations.push(ConversationSummary {
            id: row.try_get("id")?,
            post_id: row.try_get("post_id")?,
            buyer_id: row.try_get("buyer_id")?,
            seller_id: row.try_get("seller_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            post_title: row.try_get("post_title")?,
            post_price: row.try_get("post_price")?,
            post_image: row.try_get("post_image")?,
            seller_name: row.try_get("seller_name")?,
            buyer_name: row.try_get("buyer_name")?,
            last_message: row.try_get("last_message")?,
            last_message_time: row.try_get("last_message_time")?,
        });
    }

    Ok(Json(json!({ "success": true, "conversations": conversations })))
}

pub async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> ApiResult<Json<Value>> {
    let (Some(conversation_id), Some(sender_id)) = (payload.conversation_id, payload.sender_id)
    else {
        return Err(ApiError::bad_request(
            "conversationId and senderId are required",
        ));
    };
    let text = payload.message.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }

    let now = now_millis();
    let mut tx = state.pool.begin().await?;
    let inserted = sqlx::query(
        "INSERT INTO messages (conversation_id, sender_id, message, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(conversation_id)
    .bind(sender_id)
    .bind(text)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| {
        if is_foreign_key_violation(&err) {
            ApiError::not_found("Conversation or sender not found")
        } else {
            err.into()
        }
    })?;
    sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let message_id = inserted.last_insert_rowid();
    metrics::inc_message_sent(crate::SERVICE_NAME);
    tracing::info!(message_id, conversation_id, sender_id, "message sent");

    let query = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages m JOIN users u ON m.sender_id = u.id WHERE m.id = ?"
    );
    let row = sqlx::query(&query)
        .bind(message_id)
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(json!({ "success": true, "message": map_message(&row)? })))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<Value>> {
    let select = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages m JOIN users u ON m.sender_id = u.id \
         WHERE m.conversation_id = ? ORDER BY m.created_at ASC, m.id ASC"
    );
    let rows = sqlx::query(&select)
        .bind(conversation_id)
        .fetch_all(&state.pool)
        .await?;

    let mut messages = Vec::with_capacity(rows.len());
    for row in &rows {
        messages.push(map_message(row)?);
    }

    // The returned list reflects read state before this call.
    if let Some(current_user_id) = query.current_user_id {
        let marked = sqlx::query(
            "UPDATE messages SET is_read = 1 \
             WHERE conversation_id = ? AND sender_id != ? AND is_read = 0",
        )
        .bind(conversation_id)
        .bind(current_user_id)
        .execute(&state.pool)
        .await?;
        tracing::debug!(
            conversation_id,
            marked = marked.rows_affected(),
            "messages marked read"
        );
    }

    Ok(Json(json!({ "success": true, "messages": messages })))
}
