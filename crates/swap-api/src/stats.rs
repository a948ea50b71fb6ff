use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{now_millis, ApiResult, AppState};

const RECENT_ACTIVITY_WINDOW_MILLIS: i64 = 7 * 24 * 60 * 60 * 1000;

/// `{ success, stats: {...} }` response body.
#[derive(Debug, Serialize)]
pub struct StatsEnvelope<T> {
    pub success: bool,
    pub stats: T,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub post_count: i64,
    pub conversation_count: i64,
    /// Sum of listing prices, two decimals.
    pub total_value: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommunityStats {
    pub total_listings: i64,
    pub total_users: i64,
    pub recent_activity: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserCount {
    pub success: bool,
    pub count: i64,
}

pub(crate) fn format_total(total: f64) -> String {
    format!("{total:.2}")
}

pub async fn user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<StatsEnvelope<UserStats>>> {
    let (post_count, total_value): (i64, f64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(price), 0.0) FROM posts WHERE seller_id = ?",
    )
    .bind(user_id)
    .fetch_one(&state.pool)
    .await?;

    let conversation_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM conversations WHERE buyer_id = ? OR seller_id = ?",
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(StatsEnvelope {
        success: true,
        stats: UserStats {
            post_count,
            conversation_count,
            total_value: format_total(total_value),
        },
    }))
}

pub async fn community_stats(
    State(state): State<AppState>,
) -> ApiResult<Json<StatsEnvelope<CommunityStats>>> {
    let total_listings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(&state.pool)
        .await?;
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await?;
    let recent_activity: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE created_at >= ?")
        .bind(now_millis() - RECENT_ACTIVITY_WINDOW_MILLIS)
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(StatsEnvelope {
        success: true,
        stats: CommunityStats {
            total_listings,
            total_users,
            recent_activity,
        },
    }))
}

pub async fn users_count(State(state): State<AppState>) -> ApiResult<Json<UserCount>> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await?;
    Ok(Json(UserCount {
        success: true,
        count,
    }))
}
