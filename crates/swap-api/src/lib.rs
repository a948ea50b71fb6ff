use anyhow::Result;
use axum::extract::State;
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::net::SocketAddr;
use std::sync::Arc;
use swap_core::auth::{JwtConfig, DEFAULT_TOKEN_TTL_SECONDS};
use swap_core::image_host::{CloudinaryClient, CloudinaryConfig, ImageHost};
use swap_core::{config, db, http, logging, metrics, migrations, server};

mod auth;
mod conversations;
mod openapi;
mod posts;
pub mod seed;
mod stats;
mod uploads;
mod users;

#[cfg(test)]
mod contract_tests;

const SERVICE_NAME: &str = "swap-api";

#[derive(Clone)]
pub struct AppState {
    pool: Pool<Sqlite>,
    jwt_config: JwtConfig,
    image_host: Option<Arc<dyn ImageHost>>,
}

impl AppState {
    pub fn new(
        pool: Pool<Sqlite>,
        jwt_config: JwtConfig,
        image_host: Option<Arc<dyn ImageHost>>,
    ) -> Self {
        Self {
            pool,
            jwt_config,
            image_host,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub(crate) struct ErrorResponse {
    success: bool,
    code: String,
    message: String,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    headers: Vec<(&'static str, String)>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            headers: Vec::new(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    fn with_header(mut self, name: &'static str, value: String) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "DB_ERROR", err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "request failed");
        }
        let mut headers = HeaderMap::new();
        for (name, value) in self.headers {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
        let payload = ErrorResponse {
            success: false,
            code: self.code.to_string(),
            message: self.message,
        };
        (self.status, headers, Json(payload)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, utoipa::ToSchema)]
pub(crate) struct HealthStatus {
    status: String,
}

pub struct ApiConfig {
    pub addr: SocketAddr,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_seconds: u64,
    pub cloudinary: Option<CloudinaryConfig>,
}

pub fn load_config() -> Result<ApiConfig> {
    let addr = config::socket_addr_from_env("SWAP_API_ADDR", "0.0.0.0:5000")?;
    let database_url = config::required_env("DATABASE_URL")?;
    let jwt_secret = config::required_env("JWT_SECRET")?;
    let jwt_ttl_seconds = config::u64_from_env("JWT_TTL_SECONDS", DEFAULT_TOKEN_TTL_SECONDS)?;
    Ok(ApiConfig {
        addr,
        database_url,
        jwt_secret,
        jwt_ttl_seconds,
        cloudinary: CloudinaryConfig::from_env(),
    })
}

pub async fn run(config: ApiConfig) -> Result<()> {
    logging::init(SERVICE_NAME);
    metrics::init(SERVICE_NAME);

    let pool = db::connect(&config.database_url).await?;
    migrations::run(&pool).await?;

    let image_host: Option<Arc<dyn ImageHost>> = match config.cloudinary {
        Some(cloudinary) => {
            let client = reqwest_client()?;
            Some(Arc::new(CloudinaryClient::new(cloudinary, client)))
        }
        None => {
            tracing::warn!("cloudinary credentials missing; image uploads disabled");
            None
        }
    };

    let state = AppState::new(
        pool,
        JwtConfig::new(config.jwt_secret, config.jwt_ttl_seconds),
        image_host,
    );
    let router = http::apply_standard_layers(router(state), SERVICE_NAME);
    server::serve(config.addr, router).await
}

fn reqwest_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()?)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/openapi.json", get(openapi_json))
        .route("/api/register", post(users::register))
        .route("/api/login", post(users::login))
        .route("/api/upload-image", post(uploads::upload_image))
        .route(
            "/api/posts",
            get(posts::list_posts).post(posts::create_post),
        )
        .route(
            "/api/posts/:post_id",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/api/users/:user_id/posts", get(posts::list_user_posts))
        .route("/api/users/:user_id/stats", get(stats::user_stats))
        .route("/api/conversations", post(conversations::start_conversation))
        .route(
            "/api/conversations/:user_id",
            get(conversations::list_conversations),
        )
        .route("/api/messages", post(conversations::send_message))
        .route(
            "/api/messages/:conversation_id",
            get(conversations::list_messages),
        )
        .route("/api/stats/community", get(stats::community_stats))
        .route("/api/stats/users", get(stats::users_count))
        .with_state(state)
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match db::check_ready(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(HealthStatus { status: "ok".into() })),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthStatus {
                status: "unavailable".into(),
            }),
        ),
    }
}

async fn metrics_endpoint() -> impl IntoResponse {
    metrics::metrics_response(SERVICE_NAME)
}

pub(crate) async fn openapi_json(headers: HeaderMap) -> impl IntoResponse {
    let server_url = openapi::infer_server_url(&headers);
    Json(openapi::document(server_url.as_deref()))
}
