use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use swap_core::images::{ImageInput, ImageSet, PersistedImages};
use swap_core::metrics;

use crate::auth::resolve_identity;
use crate::{now_millis, ApiError, ApiResult, AppState};

const LISTING_COLUMNS: &str = "p.id, p.seller_id, p.title, p.category, p.price, p.condition, \
     p.description, p.location, p.image_urls, p.primary_image_url, p.created_at";

const INSERT_POST: &str = "INSERT INTO posts \
     (seller_id, title, category, price, condition, description, location, image_urls, primary_image_url, created_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const UPDATE_POST: &str = "UPDATE posts \
     SET title = ?, category = ?, price = ?, condition = ?, description = ?, location = ?, \
         image_urls = ?, primary_image_url = ? \
     WHERE id = ?";

const SELECT_POST_OWNER: &str = "SELECT seller_id FROM posts WHERE id = ?";

const DELETE_POST: &str = "DELETE FROM posts WHERE id = ?";

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub(crate) struct Listing {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    pub category: String,
    pub price: f64,
    pub condition: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Always an array; empty when the listing has no images.
    pub image_urls: Vec<String>,
    pub primary_image_url: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListingPayload {
    pub seller_id: Option<i64>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub price: Option<Value>,
    pub condition: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub image_urls: ImageInput,
    #[serde(default, deserialize_with = "string_or_absent")]
    pub primary_image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeletePostPayload {
    pub seller_id: Option<i64>,
}

/// Scalar listing columns after validation.
#[derive(Debug, Clone)]
pub(crate) struct ListingFields {
    pub title: String,
    pub category: String,
    pub price: f64,
    pub condition: String,
    pub description: String,
    pub location: String,
}

impl ListingPayload {
    fn validate(&self) -> ApiResult<ListingFields> {
        let fields = (|| {
            Some(ListingFields {
                title: required_text(&self.title)?,
                category: required_text(&self.category)?,
                price: parse_price(self.price.as_ref())?,
                condition: required_text(&self.condition)?,
                description: required_text(&self.description)?,
                location: required_text(&self.location)?,
            })
        })();
        fields.ok_or_else(|| ApiError::bad_request("All fields are required"))
    }

    fn image_set(&self) -> ImageSet {
        ImageSet::from_input(&self.image_urls, self.primary_image_url.as_deref())
    }
}

/// Non-string values read as absent so the first image is used instead.
fn string_or_absent<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(url) => Some(url),
        _ => None,
    })
}

fn required_text(value: &Option<String>) -> Option<String> {
    value.clone().filter(|text| !text.trim().is_empty())
}

/// Accepts numbers and numeric strings; zero, negative and non-finite prices are rejected.
pub(crate) fn parse_price(value: Option<&Value>) -> Option<f64> {
    let price = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (price.is_finite() && price > 0.0).then_some(price)
}

fn optional_column<T>(row: &SqliteRow, column: &str) -> Option<T>
where
    for<'r> T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get::<Option<T>, _>(column).ok().flatten()
}

pub(crate) fn map_listing_row(row: &SqliteRow) -> Result<Listing, sqlx::Error> {
    // A column holding something other than text decodes as no images.
    let raw_images = row
        .try_get::<Option<String>, _>("image_urls")
        .map(PersistedImages::from)
        .unwrap_or(PersistedImages::Other);
    let images = ImageSet::from_persisted(raw_images, row.try_get("primary_image_url")?);

    Ok(Listing {
        id: row.try_get("id")?,
        seller_id: row.try_get("seller_id")?,
        title: row.try_get("title")?,
        category: row.try_get("category")?,
        price: row.try_get("price")?,
        condition: row.try_get("condition")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        image_urls: images.images,
        primary_image_url: images.primary,
        created_at: row.try_get("created_at")?,
        seller_name: optional_column(row, "seller_name"),
        seller_email: optional_column(row, "seller_email"),
        seller_location: optional_column(row, "seller_location"),
        conversation_count: optional_column(row, "conversation_count"),
    })
}

pub(crate) async fn insert_listing<'e, E>(
    executor: E,
    seller_id: i64,
    fields: &ListingFields,
    images: &ImageSet,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(INSERT_POST)
        .bind(seller_id)
        .bind(&fields.title)
        .bind(&fields.category)
        .bind(fields.price)
        .bind(&fields.condition)
        .bind(&fields.description)
        .bind(&fields.location)
        .bind(images.encoded_images())
        .bind(images.primary.as_deref())
        .bind(now_millis())
        .execute(executor)
        .await?;
    Ok(result.last_insert_rowid())
}

async fn fetch_listing(state: &AppState, post_id: i64) -> Result<Option<Listing>, sqlx::Error> {
    let query = format!(
        "SELECT {LISTING_COLUMNS}, u.username AS seller_name, u.email AS seller_email, \
         u.location AS seller_location \
         FROM posts p JOIN users u ON p.seller_id = u.id WHERE p.id = ?"
    );
    let row = sqlx::query(&query)
        .bind(post_id)
        .fetch_optional(&state.pool)
        .await?;
    row.as_ref().map(map_listing_row).transpose()
}

async fn fetch_owner(state: &AppState, post_id: i64) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(SELECT_POST_OWNER)
        .bind(post_id)
        .fetch_optional(&state.pool)
        .await
}

fn ensure_exists(owner: Option<i64>) -> ApiResult<()> {
    owner
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

fn ensure_owner(owner: Option<i64>, identity: i64, action: &str) -> ApiResult<()> {
    match owner {
        None => Err(ApiError::not_found("Post not found")),
        Some(seller_id) if seller_id != identity => Err(ApiError::forbidden(format!(
            "Not authorized to {action} this post"
        ))),
        Some(_) => Ok(()),
    }
}

fn map_seller_violation(err: sqlx::Error) -> ApiError {
    let is_fk = err
        .as_database_error()
        .map(|db_err| db_err.is_foreign_key_violation())
        .unwrap_or(false);
    if is_fk {
        ApiError::bad_request("Seller not found")
    } else {
        err.into()
    }
}

pub async fn create_post(
    State(state): State<AppState>,
    Json(payload): Json<ListingPayload>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let seller_id = payload
        .seller_id
        .ok_or_else(|| ApiError::bad_request("All fields are required"))?;
    let fields = payload.validate()?;
    let images = payload.image_set();

    let post_id = insert_listing(&state.pool, seller_id, &fields, &images)
        .await
        .map_err(map_seller_violation)?;
    metrics::inc_listing_written(crate::SERVICE_NAME, "create");
    tracing::info!(
        post_id,
        seller_id,
        image_count = images.images.len(),
        "post created"
    );

    let post = fetch_listing(&state, post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Post created successfully",
            "post": post
        })),
    ))
}

pub async fn list_posts(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let query = format!(
        "SELECT {LISTING_COLUMNS}, u.username AS seller_name, u.email AS seller_email, \
         u.location AS seller_location \
         FROM posts p JOIN users u ON p.seller_id = u.id \
         ORDER BY p.created_at DESC, p.id DESC"
    );
    let rows = sqlx::query(&query).fetch_all(&state.pool).await?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in &rows {
        posts.push(map_listing_row(row)?);
    }
    tracing::debug!(count = posts.len(), "posts listed");

    Ok(Json(json!({ "success": true, "posts": posts })))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let post = fetch_listing(&state, post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;
    Ok(Json(json!({ "success": true, "post": post })))
}

pub async fn list_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let query = format!(
        "SELECT {LISTING_COLUMNS}, \
         (SELECT COUNT(*) FROM conversations c WHERE c.post_id = p.id) AS conversation_count \
         FROM posts p WHERE p.seller_id = ? \
         ORDER BY p.created_at DESC, p.id DESC"
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(&state.pool)
        .await?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in &rows {
        posts.push(map_listing_row(row)?);
    }

    Ok(Json(json!({ "success": true, "posts": posts })))
}

pub async fn update_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(payload): Json<ListingPayload>,
) -> ApiResult<Json<Value>> {
    let owner = fetch_owner(&state, post_id).await?;
    ensure_exists(owner)?;
    let identity = resolve_identity(&state, &headers, payload.seller_id)?;
    ensure_owner(owner, identity, "edit")?;

    let fields = payload.validate()?;
    let images = payload.image_set();

    sqlx::query(UPDATE_POST)
        .bind(&fields.title)
        .bind(&fields.category)
        .bind(fields.price)
        .bind(&fields.condition)
        .bind(&fields.description)
        .bind(&fields.location)
        .bind(images.encoded_images())
        .bind(images.primary.as_deref())
        .bind(post_id)
        .execute(&state.pool)
        .await?;
    metrics::inc_listing_written(crate::SERVICE_NAME, "update");
    tracing::info!(post_id, seller_id = identity, "post updated");

    let post = fetch_listing(&state, post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Post updated successfully",
        "post": post
    })))
}

pub async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let payload = if body.is_empty() {
        DeletePostPayload::default()
    } else {
        serde_json::from_slice::<DeletePostPayload>(&body)
            .map_err(|err| ApiError::bad_request(err.to_string()))?
    };

    let owner = fetch_owner(&state, post_id).await?;
    ensure_exists(owner)?;
    let identity = resolve_identity(&state, &headers, payload.seller_id)?;
    ensure_owner(owner, identity, "delete")?;

    sqlx::query(DELETE_POST)
        .bind(post_id)
        .execute(&state.pool)
        .await?;
    metrics::inc_listing_written(crate::SERVICE_NAME, "delete");
    tracing::info!(post_id, seller_id = identity, "post deleted");

    Ok(Json(json!({
        "success": true,
        "message": "Post deleted successfully"
    })))
}
