//! Media hosting for avatars, cover images, thumbnails and video files.
//!
//! Assets are addressed by an opaque public id handed out at upload time.
//! `CloudinaryStore` talks to the Cloudinary upload API; `MemoryMediaStore`
//! keeps everything in process for local development and tests.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

/// Kind of asset, which decides the Cloudinary resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Video,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Image => "image",
            ResourceKind::Video => "video",
        }
    }
}

/// A file received from a client, ready to upload.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub kind: ResourceKind,
}

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedAsset {
    pub url: String,
    pub public_id: String,
    /// Playback length in seconds, reported for videos
    pub duration: Option<f64>,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, file: MediaFile) -> Result<UploadedAsset, MediaError>;

    async fn delete(&self, public_id: &str, kind: ResourceKind) -> Result<(), MediaError>;
}

#[derive(Debug)]
pub enum MediaError {
    EmptyFile,
    Http(reqwest::Error),
    /// The media host answered with a non-success status
    Rejected { status: u16, message: String },
    TimeError,
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaError::EmptyFile => write!(f, "File is empty"),
            MediaError::Http(e) => write!(f, "Media host request failed: {}", e),
            MediaError::Rejected { status, message } => {
                write!(f, "Media host rejected request ({}): {}", status, message)
            }
            MediaError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for MediaError {}

impl From<reqwest::Error> for MediaError {
    fn from(e: reqwest::Error) -> Self {
        MediaError::Http(e)
    }
}

/// Cloudinary account credentials.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// API root, `https://api.cloudinary.com/v1_1/` unless overridden
    pub api_base: Url,
}

pub struct CloudinaryStore {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    duration: Option<f64>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Sign request parameters: sort by name, join as `k=v` with `&`, append
/// the secret, sha256.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{}{}", joined, api_secret).as_bytes()))
}

fn timestamp() -> Result<String, MediaError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .map_err(|_| MediaError::TimeError)
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.api_base.as_str().trim_end_matches('/'),
            self.config.cloud_name,
            resource_type,
            action
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MediaError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error.message,
            Err(_) => status.to_string(),
        };
        Err(MediaError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(&self, file: MediaFile) -> Result<UploadedAsset, MediaError> {
        if file.bytes.is_empty() {
            return Err(MediaError::EmptyFile);
        }

        let timestamp = timestamp()?;
        let signature = sign_params(&[("timestamp", timestamp.as_str())], &self.config.api_secret);

        let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name);
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type)?;
        }

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.endpoint("auto", "upload"))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = Self::check(response).await?.json().await?;

        info!(public_id = %body.public_id, kind = file.kind.as_str(), "Uploaded media");
        Ok(UploadedAsset {
            url: body.secure_url,
            public_id: body.public_id,
            duration: body.duration,
        })
    }

    async fn delete(&self, public_id: &str, kind: ResourceKind) -> Result<(), MediaError> {
        let timestamp = timestamp()?;
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            &self.config.api_secret,
        );

        let params = [
            ("public_id", public_id),
            ("api_key", self.config.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .client
            .post(self.endpoint(kind.as_str(), "destroy"))
            .form(&params)
            .send()
            .await?;
        Self::check(response).await?;

        debug!(public_id = %public_id, "Deleted media");
        Ok(())
    }
}

/// Stored asset in [`MemoryMediaStore`].
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub kind: ResourceKind,
    pub file_name: String,
    pub size: usize,
}

/// In-process media store. Uploaded videos report a fixed duration.
#[derive(Default)]
pub struct MemoryMediaStore {
    assets: Mutex<HashMap<String, StoredAsset>>,
}

/// Duration reported for every video uploaded to [`MemoryMediaStore`].
pub const MEMORY_VIDEO_DURATION: f64 = 42.0;

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, public_id: &str) -> bool {
        self.assets.lock().await.contains_key(public_id)
    }

    pub async fn len(&self) -> usize {
        self.assets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assets.lock().await.is_empty()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, file: MediaFile) -> Result<UploadedAsset, MediaError> {
        if file.bytes.is_empty() {
            return Err(MediaError::EmptyFile);
        }

        let public_id = uuid::Uuid::new_v4().simple().to_string();
        let url = format!(
            "memory://{}/{}/{}",
            file.kind.as_str(),
            public_id,
            file.file_name
        );
        let duration = (file.kind == ResourceKind::Video).then_some(MEMORY_VIDEO_DURATION);

        self.assets.lock().await.insert(
            public_id.clone(),
            StoredAsset {
                kind: file.kind,
                file_name: file.file_name,
                size: file.bytes.len(),
            },
        );

        Ok(UploadedAsset {
            url,
            public_id,
            duration,
        })
    }

    async fn delete(&self, public_id: &str, kind: ResourceKind) -> Result<(), MediaError> {
        let mut assets = self.assets.lock().await;
        match assets.get(public_id) {
            Some(asset) if asset.kind == kind => {
                assets.remove(public_id);
                Ok(())
            }
            _ => Err(MediaError::Rejected {
                status: 404,
                message: "not found".to_string(),
            }),
        }
    }
}
