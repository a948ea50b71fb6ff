use crate::{router, AppState};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use swap_core::auth::{issue_token, JwtConfig};
use swap_core::image_host::{ImageHost, ImageHostError, UploadRequest, UploadedImage};
use tower::ServiceExt;

struct StubImageHost;

#[async_trait]
impl ImageHost for StubImageHost {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadedImage, ImageHostError> {
        if request.image.starts_with("data:bad") {
            return Err(ImageHostError::Rejected {
                status: 400,
                message: "Invalid image file".to_string(),
            });
        }
        Ok(UploadedImage {
            secure_url: format!("https://cdn.test/{}/deck.jpg", request.folder),
            public_id: format!("{}/deck", request.folder),
        })
    }
}

fn jwt_config() -> JwtConfig {
    JwtConfig::new("test-secret", 3600)
}

async fn test_pool() -> Pool<Sqlite> {
    let pool = swap_core::db::connect_in_memory()
        .await
        .expect("connect database");
    swap_core::migrations::run(&pool)
        .await
        .expect("run migrations");
    pool
}

async fn test_state() -> AppState {
    AppState::new(test_pool().await, jwt_config(), Some(Arc::new(StubImageHost)))
}

async fn insert_user(pool: &Pool<Sqlite>, username: &str) -> i64 {
    sqlx::query(
        "INSERT INTO users (first_name, last_name, username, email, password_hash, location, created_at) \
         VALUES ('Test', 'Rider', ?, ?, 'not-a-hash', 'Nairobi', 0)",
    )
    .bind(username)
    .bind(format!("{username}@example.com"))
    .execute(pool)
    .await
    .expect("insert user")
    .last_insert_rowid()
}

async fn insert_raw_post(pool: &Pool<Sqlite>, seller_id: i64, image_urls: Option<&str>) -> i64 {
    sqlx::query(
        "INSERT INTO posts (seller_id, title, category, price, condition, description, location, \
         image_urls, primary_image_url, created_at) \
         VALUES (?, 'Legacy', 'decks', 20.0, 'good', 'old row', 'Nairobi', ?, NULL, 1)",
    )
    .bind(seller_id)
    .bind(image_urls)
    .execute(pool)
    .await
    .expect("insert post")
    .last_insert_rowid()
}

fn listing_body(seller_id: i64, extra: Value) -> Value {
    let mut body = json!({
        "sellerId": seller_id,
        "title": "Baker Deck",
        "category": "decks",
        "price": 55,
        "condition": "good",
        "description": "Lightly used",
        "location": "Nairobi"
    });
    if let (Some(target), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
    body
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    let payload: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("json body")
    };
    (status, payload)
}

fn json_request(method: &str, uri: &str, payload: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(payload.to_string()))
        .expect("request")
}

async fn post_json(app: Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    send(app, json_request("POST", uri, &payload, None)).await
}

async fn put_json(
    app: Router,
    uri: &str,
    payload: Value,
    token: Option<&str>,
) -> (StatusCode, Value) {
    send(app, json_request("PUT", uri, &payload, token)).await
}

async fn delete_json(app: Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    send(app, json_request("DELETE", uri, &payload, None)).await
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("host", "localhost:5000")
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

#[tokio::test]
async fn create_listing_with_images_defaults_primary_to_first() {
    let state = test_state().await;
    let seller = insert_user(&state.pool, "alice").await;
    let app = router(state);

    let (status, body) = post_json(
        app.clone(),
        "/api/posts",
        listing_body(seller, json!({ "imageUrls": ["a.jpg", "b.jpg"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["post"]["image_urls"], json!(["a.jpg", "b.jpg"]));
    assert_eq!(body["post"]["primary_image_url"], "a.jpg");
    assert_eq!(body["post"]["seller_name"], "alice");

    let id = body["post"]["id"].as_i64().expect("post id");
    let (status, body) = get_json(app, &format!("/api/posts/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["image_urls"], json!(["a.jpg", "b.jpg"]));
    assert_eq!(body["post"]["primary_image_url"], "a.jpg");
    assert_eq!(body["post"]["price"], json!(55.0));
}

#[tokio::test]
async fn create_listing_without_images_stores_null() {
    let state = test_state().await;
    let pool = state.pool.clone();
    let seller = insert_user(&pool, "bob").await;
    let app = router(state);

    let (status, body) = post_json(app, "/api/posts", listing_body(seller, json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["post"]["image_urls"], json!([]));
    assert_eq!(body["post"]["primary_image_url"], Value::Null);

    let id = body["post"]["id"].as_i64().expect("post id");
    let stored: Option<String> = sqlx::query_scalar("SELECT image_urls FROM posts WHERE id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .expect("stored images");
    assert_eq!(stored, None);
}

#[tokio::test]
async fn create_listing_wraps_single_string_image() {
    let state = test_state().await;
    let seller = insert_user(&state.pool, "carol").await;
    let app = router(state);

    let (status, body) = post_json(
        app,
        "/api/posts",
        listing_body(seller, json!({ "imageUrls": "solo.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["post"]["image_urls"], json!(["solo.jpg"]));
    assert_eq!(body["post"]["primary_image_url"], "solo.jpg");
}

#[tokio::test]
async fn explicit_primary_outside_image_list_is_kept() {
    let state = test_state().await;
    let seller = insert_user(&state.pool, "dave").await;
    let app = router(state);

    let (status, body) = post_json(
        app,
        "/api/posts",
        listing_body(
            seller,
            json!({ "imageUrls": ["a.jpg"], "primaryImageUrl": "cover.jpg" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["post"]["image_urls"], json!(["a.jpg"]));
    assert_eq!(body["post"]["primary_image_url"], "cover.jpg");
}

#[tokio::test]
async fn non_string_primary_is_treated_as_absent() {
    let state = test_state().await;
    let seller = insert_user(&state.pool, "dina").await;
    let app = router(state);

    let (status, body) = post_json(
        app.clone(),
        "/api/posts",
        listing_body(
            seller,
            json!({ "imageUrls": ["a.jpg", "b.jpg"], "primaryImageUrl": 7 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["post"]["primary_image_url"], "a.jpg");

    let id = body["post"]["id"].as_i64().expect("post id");
    let (status, body) = put_json(
        app,
        &format!("/api/posts/{id}"),
        listing_body(
            seller,
            json!({ "imageUrls": ["c.jpg", "d.jpg"], "primaryImageUrl": { "url": "x.jpg" } }),
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["primary_image_url"], "c.jpg");
}

#[tokio::test]
async fn create_listing_rejects_missing_fields_and_bad_price() {
    let state = test_state().await;
    let seller = insert_user(&state.pool, "erin").await;
    let app = router(state);

    let mut missing = listing_body(seller, json!({}));
    missing.as_object_mut().expect("object").remove("title");
    let (status, body) = post_json(app.clone(), "/api/posts", missing).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
    assert_eq!(body["message"], "All fields are required");

    let (status, _) = post_json(
        app.clone(),
        "/api/posts",
        listing_body(seller, json!({ "price": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        app,
        "/api/posts",
        listing_body(seller, json!({ "price": "42.50" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["post"]["price"], json!(42.5));
}

#[tokio::test]
async fn create_listing_for_unknown_seller_is_rejected() {
    let state = test_state().await;
    let app = router(state);

    let (status, body) = post_json(app, "/api/posts", listing_body(999, json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Seller not found");
}

#[tokio::test]
async fn legacy_and_malformed_rows_decode_on_read() {
    let state = test_state().await;
    let pool = state.pool.clone();
    let seller = insert_user(&pool, "frank").await;
    let legacy = insert_raw_post(&pool, seller, Some("https://legacy.test/deck.jpg")).await;
    let malformed = insert_raw_post(&pool, seller, Some("[\"unterminated")).await;
    let empty = insert_raw_post(&pool, seller, Some("")).await;
    let app = router(state);

    let (status, body) = get_json(app.clone(), "/api/posts").await;
    assert_eq!(status, StatusCode::OK);
    let posts = body["posts"].as_array().expect("posts");
    assert_eq!(posts.len(), 3);
    let images_of = |id: i64| {
        posts
            .iter()
            .find(|post| post["id"] == id)
            .map(|post| post["image_urls"].clone())
            .expect("post present")
    };
    assert_eq!(images_of(legacy), json!(["https://legacy.test/deck.jpg"]));
    assert_eq!(images_of(malformed), json!([]));
    assert_eq!(images_of(empty), json!([]));

    let (status, body) = get_json(app, &format!("/api/posts/{legacy}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["primary_image_url"], Value::Null);
}

#[tokio::test]
async fn listings_are_newest_first() {
    let state = test_state().await;
    let pool = state.pool.clone();
    let seller = insert_user(&pool, "gina").await;
    let first = insert_raw_post(&pool, seller, None).await;
    let second = insert_raw_post(&pool, seller, None).await;
    let app = router(state);

    let (_, body) = get_json(app.clone(), "/api/posts").await;
    let ids: Vec<i64> = body["posts"]
        .as_array()
        .expect("posts")
        .iter()
        .filter_map(|post| post["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![second, first]);

    let (_, body) = get_json(app, &format!("/api/users/{seller}/posts")).await;
    let posts = body["posts"].as_array().expect("posts");
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["id"], second);
    assert_eq!(posts[0]["conversation_count"], 0);
}

#[tokio::test]
async fn update_requires_owner_and_falls_back_to_first_image() {
    let state = test_state().await;
    let owner = insert_user(&state.pool, "hana").await;
    let stranger = insert_user(&state.pool, "ivan").await;
    let app = router(state);

    let (_, created) = post_json(
        app.clone(),
        "/api/posts",
        listing_body(
            owner,
            json!({ "imageUrls": ["a.jpg"], "primaryImageUrl": "a.jpg" }),
        ),
    )
    .await;
    let id = created["post"]["id"].as_i64().expect("post id");
    let uri = format!("/api/posts/{id}");

    let (status, body) = put_json(
        app.clone(),
        &uri,
        listing_body(stranger, json!({ "imageUrls": ["x.jpg"] })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized to edit this post");

    let (status, body) = put_json(
        app.clone(),
        &uri,
        listing_body(
            owner,
            json!({ "title": "Baker Deck v2", "imageUrls": ["c.jpg", "d.jpg"] }),
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["title"], "Baker Deck v2");
    assert_eq!(body["post"]["image_urls"], json!(["c.jpg", "d.jpg"]));
    assert_eq!(body["post"]["primary_image_url"], "c.jpg");

    let (status, _) = put_json(app, "/api/posts/9999", listing_body(owner, json!({})), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bearer_token_decides_identity_over_body() {
    let state = test_state().await;
    let owner = insert_user(&state.pool, "jade").await;
    let stranger = insert_user(&state.pool, "kofi").await;
    let app = router(state);

    let (_, created) = post_json(app.clone(), "/api/posts", listing_body(owner, json!({}))).await;
    let id = created["post"]["id"].as_i64().expect("post id");
    let uri = format!("/api/posts/{id}");

    let (stranger_token, _) =
        issue_token(stranger, "kofi@example.com", &jwt_config()).expect("token");
    let (status, _) = put_json(
        app.clone(),
        &uri,
        listing_body(owner, json!({})),
        Some(&stranger_token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = json_request("PUT", &uri, &listing_body(owner, json!({})), Some("garbage"));
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("www-authenticate"));

    let (owner_token, _) = issue_token(owner, "jade@example.com", &jwt_config()).expect("token");
    let (status, _) = put_json(app, &uri, listing_body(stranger, json!({})), Some(&owner_token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn delete_requires_identity_and_owner() {
    let state = test_state().await;
    let owner = insert_user(&state.pool, "lena").await;
    let stranger = insert_user(&state.pool, "milo").await;
    let app = router(state);

    let (_, created) = post_json(app.clone(), "/api/posts", listing_body(owner, json!({}))).await;
    let id = created["post"]["id"].as_i64().expect("post id");
    let uri = format!("/api/posts/{id}");

    let request = Request::builder()
        .method("DELETE")
        .uri(&uri)
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_REQUIRED");

    let (status, _) = delete_json(app.clone(), &uri, json!({ "sellerId": stranger })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = delete_json(app.clone(), &uri, json!({ "sellerId": owner })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = get_json(app, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn missing_post_is_not_found_before_identity_check() {
    let app = router(test_state().await);

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/posts/4242")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let mut anonymous = listing_body(1, json!({}));
    anonymous.as_object_mut().expect("object").remove("sellerId");
    let (status, _) = put_json(app, "/api/posts/4242", anonymous, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_and_login_flow() {
    let state = test_state().await;
    let app = router(state);

    let registration = json!({
        "firstName": "Nia",
        "lastName": "Otieno",
        "username": "nia",
        "email": "nia@example.com",
        "password": "kickflip",
        "location": "Mombasa"
    });
    let (status, body) = post_json(app.clone(), "/api/register", registration.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let user_id = body["userId"].as_i64().expect("user id");

    let (status, body) = post_json(app.clone(), "/api/register", registration).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username or email already exists");

    let (status, _) = post_json(
        app.clone(),
        "/api/register",
        json!({ "username": "incomplete" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        app.clone(),
        "/api/login",
        json!({ "email": "nia@example.com", "password": "kickflip" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id);
    assert_eq!(body["user"]["firstName"], "Nia");
    let token = body["token"].as_str().expect("token");
    let claims = swap_core::auth::verify_token(token, &jwt_config()).expect("valid token");
    assert_eq!(claims.user_id().expect("subject"), user_id);

    let (status, body) = post_json(
        app.clone(),
        "/api/login",
        json!({ "email": "nia@example.com", "password": "ollie" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_FAILED");
    assert_eq!(body["message"], "Invalid email or password");

    let (status, _) = post_json(
        app,
        "/api/login",
        json!({ "email": "nobody@example.com", "password": "kickflip" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn conversations_and_messages_flow() {
    let state = test_state().await;
    let pool = state.pool.clone();
    let seller = insert_user(&pool, "omar").await;
    let buyer = insert_user(&pool, "pia").await;
    let app = router(state);

    let (_, created) = post_json(
        app.clone(),
        "/api/posts",
        listing_body(seller, json!({ "imageUrls": ["deck.jpg"] })),
    )
    .await;
    let post_id = created["post"]["id"].as_i64().expect("post id");

    let start = json!({ "postId": post_id, "buyerId": buyer, "sellerId": seller });
    let (status, first) = post_json(app.clone(), "/api/conversations", start.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = post_json(app.clone(), "/api/conversations", start).await;
    let conversation_id = first["conversation"]["id"].as_i64().expect("conversation id");
    assert_eq!(second["conversation"]["id"], conversation_id);

    let (status, body) = post_json(
        app.clone(),
        "/api/messages",
        json!({ "conversationId": conversation_id, "senderId": buyer, "message": "   " }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Message cannot be empty");

    let (status, body) = post_json(
        app.clone(),
        "/api/messages",
        json!({ "conversationId": conversation_id, "senderId": buyer, "message": "  Still available?  " }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["message"], "Still available?");
    assert_eq!(body["message"]["sender_name"], "pia");
    assert_eq!(body["message"]["is_read"], false);

    let (status, body) = get_json(app.clone(), &format!("/api/conversations/{seller}")).await;
    assert_eq!(status, StatusCode::OK);
    let conversations = body["conversations"].as_array().expect("conversations");
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["last_message"], "Still available?");
    assert_eq!(conversations[0]["post_image"], "deck.jpg");
    assert_eq!(conversations[0]["buyer_name"], "pia");

    let uri = format!("/api/messages/{conversation_id}?currentUserId={seller}");
    let (status, body) = get_json(app.clone(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().expect("messages").len(), 1);

    let unread: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = ? AND is_read = 0")
            .bind(conversation_id)
            .fetch_one(&pool)
            .await
            .expect("unread count");
    assert_eq!(unread, 0);

    let (_, body) = get_json(app, &format!("/api/users/{seller}/posts")).await;
    assert_eq!(body["posts"][0]["conversation_count"], 1);
}

#[tokio::test]
async fn messages_are_not_marked_read_without_reader() {
    let state = test_state().await;
    let pool = state.pool.clone();
    let seller = insert_user(&pool, "quin").await;
    let buyer = insert_user(&pool, "rosa").await;
    let post_id = insert_raw_post(&pool, seller, None).await;
    let app = router(state);

    let (_, conversation) = post_json(
        app.clone(),
        "/api/conversations",
        json!({ "postId": post_id, "buyerId": buyer, "sellerId": seller }),
    )
    .await;
    let conversation_id = conversation["conversation"]["id"].as_i64().expect("id");
    post_json(
        app.clone(),
        "/api/messages",
        json!({ "conversationId": conversation_id, "senderId": buyer, "message": "hi" }),
    )
    .await;

    get_json(app.clone(), &format!("/api/messages/{conversation_id}")).await;
    get_json(
        app,
        &format!("/api/messages/{conversation_id}?currentUserId={buyer}"),
    )
    .await;

    let unread: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE is_read = 0")
        .fetch_one(&pool)
        .await
        .expect("unread count");
    assert_eq!(unread, 1);
}

#[tokio::test]
async fn stats_report_counts_and_totals() {
    let state = test_state().await;
    let seller = insert_user(&state.pool, "sam").await;
    insert_user(&state.pool, "tess").await;
    let app = router(state);

    for price in [json!(65), json!("45")] {
        let (status, _) = post_json(
            app.clone(),
            "/api/posts",
            listing_body(seller, json!({ "price": price })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = get_json(app.clone(), &format!("/api/users/{seller}/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["postCount"], 2);
    assert_eq!(body["stats"]["conversationCount"], 0);
    assert_eq!(body["stats"]["totalValue"], "110.00");

    let (_, body) = get_json(app.clone(), "/api/users/424242/stats").await;
    assert_eq!(body["stats"]["totalValue"], "0.00");

    let (_, body) = get_json(app.clone(), "/api/stats/community").await;
    assert_eq!(body["stats"]["totalListings"], 2);
    assert_eq!(body["stats"]["totalUsers"], 2);
    assert_eq!(body["stats"]["recentActivity"], 2);

    let (_, body) = get_json(app, "/api/stats/users").await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn upload_image_forwards_to_host() {
    let app = router(test_state().await);

    let (status, body) = post_json(
        app.clone(),
        "/api/upload-image",
        json!({ "image": "data:image/png;base64,AAAA", "fileName": "deck.png" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imageUrl"], "https://cdn.test/skateswap/deck.jpg");
    assert_eq!(body["publicId"], "skateswap/deck");

    let (status, _) = post_json(app.clone(), "/api/upload-image", json!({ "image": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        app,
        "/api/upload-image",
        json!({ "image": "data:bad" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "UPLOAD_FAILED");
}

#[tokio::test]
async fn upload_image_without_host_is_unavailable() {
    let state = AppState::new(test_pool().await, jwt_config(), None);
    let app = router(state);

    let (status, body) = post_json(
        app,
        "/api/upload-image",
        json!({ "image": "https://example.com/deck.jpg" }),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "IMAGE_HOST_UNAVAILABLE");
}

#[tokio::test]
async fn seed_is_idempotent() {
    let pool = test_pool().await;

    let first = crate::seed::seed(&pool).await.expect("seed");
    assert!(first.test_user_created);
    assert_eq!(first.listings_created, 3);

    let second = crate::seed::seed(&pool).await.expect("seed again");
    assert!(!second.test_user_created);
    assert_eq!(second.listings_created, 0);

    let primaries: Vec<Option<String>> =
        sqlx::query_scalar("SELECT primary_image_url FROM posts ORDER BY id")
            .fetch_all(&pool)
            .await
            .expect("primaries");
    assert_eq!(primaries.len(), 3);
    assert!(primaries.iter().all(|primary| primary.is_some()));

    let app = router(AppState::new(pool, jwt_config(), None));
    let (status, _) = post_json(
        app,
        "/api/login",
        json!({ "email": crate::seed::TEST_USER_EMAIL, "password": crate::seed::TEST_USER_PASSWORD }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = router(test_state().await);
    let (status, body) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn openapi_contract_contains_marketplace_paths() {
    let app = router(test_state().await);
    let (status, payload) = get_json(app, "/api/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["servers"][0]["url"], "http://localhost:5000");

    let paths = payload["paths"].as_object().expect("paths");
    for path in [
        "/api/posts",
        "/api/posts/{post_id}",
        "/api/users/{user_id}/posts",
        "/api/register",
        "/api/login",
        "/api/upload-image",
        "/api/messages/{conversation_id}",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}
