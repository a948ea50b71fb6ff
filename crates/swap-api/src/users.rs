use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::Row;
use swap_core::{auth, metrics};
use utoipa::ToSchema;

use crate::{now_millis, ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|text| !text.is_empty())
}

fn auth_failed() -> ApiError {
    metrics::inc_auth_failure(crate::SERVICE_NAME);
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        "AUTH_FAILED",
        "Invalid email or password",
    )
}

/// Account fields ready for insertion.
pub(crate) struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub location: Option<&'a str>,
}

pub(crate) async fn insert_user(
    pool: &sqlx::Pool<sqlx::Sqlite>,
    user: &NewUser<'_>,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (first_name, last_name, username, email, password_hash, location, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.username)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.location)
    .bind(now_millis())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<Value>> {
    let (Some(first_name), Some(last_name), Some(username), Some(email), Some(password)) = (
        present(&payload.first_name),
        present(&payload.last_name),
        present(&payload.username),
        present(&payload.email),
        payload.password.as_deref().filter(|value| !value.is_empty()),
    ) else {
        return Err(ApiError::bad_request("All fields are required"));
    };

    let password_hash = auth::hash_password(password).map_err(|err| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "AUTH_ERROR",
            err.to_string(),
        )
    })?;

    let new_user = NewUser {
        first_name,
        last_name,
        username,
        email,
        password_hash: &password_hash,
        location: present(&payload.location),
    };
    let user_id = insert_user(&state.pool, &new_user).await.map_err(|err| {
        let is_unique = err
            .as_database_error()
            .map(|db_err| db_err.is_unique_violation())
            .unwrap_or(false);
        if is_unique {
            ApiError::bad_request("Username or email already exists")
        } else {
            err.into()
        }
    })?;
    tracing::info!(user_id, username, "user registered");

    Ok(Json(json!({
        "success": true,
        "message": "User registered successfully",
        "userId": user_id
    })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let (Some(email), Some(password)) = (
        present(&payload.email),
        payload.password.as_deref().filter(|value| !value.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    let row = sqlx::query(
        "SELECT id, username, email, first_name, last_name, password_hash FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(&state.pool)
    .await?;
    let Some(row) = row else {
        return Err(auth_failed());
    };

    let password_hash: String = row.try_get("password_hash")?;
    // Unparseable stored hashes are treated as a mismatch.
    if !auth::verify_password(password, &password_hash).unwrap_or(false) {
        return Err(auth_failed());
    }

    let user = UserSummary {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
    };
    let (token, _claims) = auth::issue_token(user.id, &user.email, &state.jwt_config).map_err(
        |err| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_ERROR",
                err.to_string(),
            )
        },
    )?;
    metrics::inc_auth_success(crate::SERVICE_NAME);
    tracing::info!(user_id = user.id, "user logged in");

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": user
    })))
}
