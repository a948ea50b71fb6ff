use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use swap_core::{auth, metrics};

use crate::{ApiError, ApiResult, AppState};

const AUTHENTICATE_BEARER_CHALLENGE: &str = r#"Bearer realm="swap-api""#;

/// Identity of the caller for ownership checks.
///
/// A bearer token, when sent, must verify and decides the identity on its
/// own. Without one the seller id claimed in the request body is used.
pub(crate) fn resolve_identity(
    state: &AppState,
    headers: &HeaderMap,
    claimed_seller_id: Option<i64>,
) -> ApiResult<i64> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return claimed_seller_id.ok_or_else(|| auth_required_error("missing seller identity"));
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| auth_required_error("invalid token"))?;
    let claims = auth::verify_token(token, &state.jwt_config).map_err(|err| {
        metrics::inc_auth_failure(crate::SERVICE_NAME);
        auth_required_error(err.to_string())
    })?;
    claims
        .user_id()
        .map_err(|err| auth_required_error(err.to_string()))
}

fn auth_required_error(message: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "AUTH_REQUIRED", message).with_header(
        "www-authenticate",
        AUTHENTICATE_BEARER_CHALLENGE.to_string(),
    )
}
