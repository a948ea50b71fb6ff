//! Third-party image hosting. Listings only ever store the URLs the host
//! hands back; the upload itself is delegated here.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config;

pub const DEFAULT_FOLDER: &str = "skateswap";
const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Data URI (`data:image/png;base64,...`) or a remote URL the host fetches.
    pub image: String,
    pub file_name: Option<String>,
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub secure_url: String,
    pub public_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageHostError {
    #[error("image host request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("image host rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("image host returned an unexpected response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadedImage, ImageHostError>;
}

#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl CloudinaryConfig {
    /// `None` unless all three credentials are set.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            cloud_name: config::optional_env("CLOUDINARY_CLOUD_NAME")?,
            api_key: config::optional_env("CLOUDINARY_API_KEY")?,
            api_secret: config::optional_env("CLOUDINARY_API_SECRET")?,
        })
    }
}

#[derive(Clone)]
pub struct CloudinaryClient {
    config: CloudinaryConfig,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
}

#[derive(Deserialize)]
struct CloudinaryErrorBody {
    error: CloudinaryErrorMessage,
}

#[derive(Deserialize)]
struct CloudinaryErrorMessage {
    message: String,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            base_url: CLOUDINARY_API_BASE.to_string(),
            http,
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/image/upload", self.base_url, self.config.cloud_name)
    }

    fn signed_params(&self, request: &UploadRequest, timestamp: u64) -> Vec<(String, String)> {
        let mut signed = vec![
            ("folder".to_string(), request.folder.clone()),
            ("timestamp".to_string(), timestamp.to_string()),
        ];
        if let Some(name) = request.file_name.as_deref().and_then(display_name) {
            signed.push(("display_name".to_string(), name));
        }
        let signature = sign_params(&signed, &self.config.api_secret);

        let mut params = signed;
        params.push(("api_key".to_string(), self.config.api_key.clone()));
        params.push(("signature".to_string(), signature));
        params.push(("signature_algorithm".to_string(), "sha256".to_string()));
        params.push(("file".to_string(), request.image.clone()));
        params
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadedImage, ImageHostError> {
        let timestamp = crate::auth::unix_seconds()
            .map_err(|err| ImageHostError::InvalidResponse(err.to_string()))?;
        let params = self.signed_params(request, timestamp);

        let response = self.http.post(self.upload_url()).form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<CloudinaryErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(ImageHostError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CloudinaryUploadResponse = response.json().await?;
        match (parsed.secure_url, parsed.public_id) {
            (Some(secure_url), Some(public_id)) => Ok(UploadedImage {
                secure_url,
                public_id,
            }),
            _ => Err(ImageHostError::InvalidResponse(
                "missing secure_url or public_id".to_string(),
            )),
        }
    }
}

/// `key=value` pairs sorted by key and joined with `&`.
pub fn string_to_sign(params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn sign_params(params: &[(String, String)], api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(string_to_sign(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn display_name(file_name: &str) -> Option<String> {
    let trimmed = file_name.trim();
    let stem = trimmed
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(trimmed);
    (!stem.is_empty()).then(|| stem.to_string())
}
