#![allow(dead_code)]

use axum::http::HeaderMap;
use utoipa::openapi::server::ServerBuilder;
use utoipa::OpenApi;

use crate::conversations::{
    Conversation, ConversationSummary, Message, SendMessageRequest, StartConversationRequest,
};
use crate::posts::Listing;
use crate::stats::{CommunityStats, UserCount, UserStats};
use crate::uploads::UploadImageRequest;
use crate::users::{LoginRequest, RegisterRequest, UserSummary};
use crate::{ErrorResponse, HealthStatus};

#[derive(OpenApi)]
#[openapi(
    paths(
        healthz_doc,
        metrics_doc,
        openapi_doc,
        register_doc,
        login_doc,
        upload_image_doc,
        posts_list_doc,
        posts_create_doc,
        posts_get_doc,
        posts_update_doc,
        posts_delete_doc,
        user_posts_doc,
        user_stats_doc,
        conversations_start_doc,
        conversations_list_doc,
        messages_send_doc,
        messages_list_doc,
        community_stats_doc,
        users_count_doc
    ),
    components(schemas(
        HealthStatus,
        ErrorResponse,
        Listing,
        RegisterRequest,
        LoginRequest,
        UserSummary,
        UploadImageRequest,
        StartConversationRequest,
        SendMessageRequest,
        Conversation,
        ConversationSummary,
        Message,
        UserStats,
        CommunityStats,
        UserCount
    )),
    tags(
        (name = "swap-api", description = "SkateSwap marketplace API")
    )
)]
pub struct SwapApiDoc;

pub fn document(server_url: Option<&str>) -> utoipa::openapi::OpenApi {
    let mut doc = SwapApiDoc::openapi();
    if let Some(url) = server_url {
        doc.servers = Some(vec![ServerBuilder::new().url(url).build()]);
    }
    doc
}

pub fn infer_server_url(headers: &HeaderMap) -> Option<String> {
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|value| value.to_str().ok())?;
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    Some(format!("{proto}://{host}"))
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, body = HealthStatus), (status = 503, body = HealthStatus))
)]
fn healthz_doc() {}

#[utoipa::path(
    get,
    path = "/metrics",
    responses((status = 200, content_type = "text/plain", body = String))
)]
fn metrics_doc() {}

#[utoipa::path(
    get,
    path = "/api/openapi.json",
    responses((status = 200, body = serde_json::Value))
)]
fn openapi_doc() {}

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses((status = 200, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn register_doc() {}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 401, body = ErrorResponse)
    )
)]
fn login_doc() {}

#[utoipa::path(
    post,
    path = "/api/upload-image",
    request_body = UploadImageRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
        (status = 503, body = ErrorResponse)
    )
)]
fn upload_image_doc() {}

#[utoipa::path(
    get,
    path = "/api/posts",
    responses((status = 200, body = serde_json::Value))
)]
fn posts_list_doc() {}

#[utoipa::path(
    post,
    path = "/api/posts",
    request_body = serde_json::Value,
    responses((status = 201, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn posts_create_doc() {}

#[utoipa::path(
    get,
    path = "/api/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Listing id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn posts_get_doc() {}

#[utoipa::path(
    put,
    path = "/api/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Listing id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 401, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn posts_update_doc() {}

#[utoipa::path(
    delete,
    path = "/api/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Listing id")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 401, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn posts_delete_doc() {}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}/posts",
    params(("user_id" = i64, Path, description = "Seller id")),
    responses((status = 200, body = serde_json::Value))
)]
fn user_posts_doc() {}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}/stats",
    params(("user_id" = i64, Path, description = "User id")),
    responses((status = 200, description = "`{ success, stats: UserStats }`", body = serde_json::Value))
)]
fn user_stats_doc() {}

#[utoipa::path(
    post,
    path = "/api/conversations",
    request_body = StartConversationRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn conversations_start_doc() {}

#[utoipa::path(
    get,
    path = "/api/conversations/{user_id}",
    params(("user_id" = i64, Path, description = "Buyer or seller id")),
    responses((status = 200, body = serde_json::Value))
)]
fn conversations_list_doc() {}

#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn messages_send_doc() {}

#[utoipa::path(
    get,
    path = "/api/messages/{conversation_id}",
    params(
        ("conversation_id" = i64, Path, description = "Conversation id"),
        ("currentUserId" = Option<i64>, Query, description = "Reader whose incoming messages are marked read")
    ),
    responses((status = 200, body = serde_json::Value))
)]
fn messages_list_doc() {}

#[utoipa::path(
    get,
    path = "/api/stats/community",
    responses((status = 200, description = "`{ success, stats: CommunityStats }`", body = serde_json::Value))
)]
fn community_stats_doc() {}

#[utoipa::path(
    get,
    path = "/api/stats/users",
    responses((status = 200, body = UserCount))
)]
fn users_count_doc() {}
