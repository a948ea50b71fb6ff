use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use swap_core::image_host::{UploadRequest, DEFAULT_FOLDER};
use swap_core::metrics::{self, UPLOAD_RESULT_ERROR, UPLOAD_RESULT_SUCCESS};
use utoipa::ToSchema;

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageRequest {
    /// Data URI or remote URL.
    pub image: Option<String>,
    pub file_name: Option<String>,
}

pub async fn upload_image(
    State(state): State<AppState>,
    Json(payload): Json<UploadImageRequest>,
) -> ApiResult<Json<Value>> {
    let Some(image) = payload.image.filter(|image| !image.trim().is_empty()) else {
        return Err(ApiError::bad_request("No image provided"));
    };
    let Some(host) = state.image_host.as_ref() else {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "IMAGE_HOST_UNAVAILABLE",
            "Image uploads are not configured",
        ));
    };

    let request = UploadRequest {
        image,
        file_name: payload.file_name,
        folder: DEFAULT_FOLDER.to_string(),
    };
    let uploaded = host.upload(&request).await.map_err(|err| {
        metrics::inc_image_upload(crate::SERVICE_NAME, UPLOAD_RESULT_ERROR);
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "UPLOAD_FAILED",
            format!("Failed to upload image: {err}"),
        )
    })?;
    metrics::inc_image_upload(crate::SERVICE_NAME, UPLOAD_RESULT_SUCCESS);
    tracing::info!(public_id = %uploaded.public_id, "image uploaded");

    Ok(Json(json!({
        "success": true,
        "imageUrl": uploaded.secure_url,
        "publicId": uploaded.public_id
    })))
}
