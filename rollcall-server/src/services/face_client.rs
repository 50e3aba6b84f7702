//! Face embedding service client
//!
//! The embedding model runs as a separate HTTP service. Two calls are used:
//! - `POST {url}/embedding/student`: enrollment images → one 512-d vector
//! - `POST {url}/embedding/classroom`: classroom photos → one vector per detected face
//!
//! A 4xx response means the images themselves are unusable. Every other
//! failure (timeout, 5xx, transport, malformed body) means the service is
//! unavailable and the caller may retry.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AttendanceError;
use crate::models::{Embedding, EMBEDDING_DIM};

const USER_AGENT: &str = concat!("rollcall-server/", env!("CARGO_PKG_VERSION"));

/// Face service errors
#[derive(Debug, Error)]
pub enum FaceServiceError {
    /// Service answered 4xx: the images cannot be used
    #[error("Face service rejected the images ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// Timeout, 5xx or connection failure
    #[error("Face service unavailable: {0}")]
    Unavailable(String),

    /// Image file could not be read from storage
    #[error("Cannot read image {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Response body did not have the expected shape
    #[error("Invalid face service response: {0}")]
    InvalidResponse(String),
}

impl From<FaceServiceError> for AttendanceError {
    fn from(err: FaceServiceError) -> Self {
        match err {
            FaceServiceError::Rejected { .. } | FaceServiceError::Unreadable { .. } => {
                AttendanceError::PhotosUnusable(err.to_string())
            }
            FaceServiceError::Unavailable(_) | FaceServiceError::InvalidResponse(_) => {
                AttendanceError::UpstreamUnavailable(err.to_string())
            }
        }
    }
}

/// Result of a student enrollment call
#[derive(Debug, Clone)]
pub struct StudentEmbedding {
    pub embedding: Embedding,
    pub images_used: usize,
}

/// Remote face embedding operations
#[async_trait]
pub trait FaceEmbeddingService: Send + Sync {
    /// One embedding representing the student's face across `images`
    async fn embed(&self, student_id: Uuid, images: &[PathBuf]) -> Result<StudentEmbedding, FaceServiceError>;

    /// Embeddings of every face detected across `images`
    async fn detect_faces(&self, images: &[PathBuf]) -> Result<Vec<Embedding>, FaceServiceError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentEmbeddingResponse {
    embedding: Vec<f32>,
    #[serde(default)]
    images_used: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct DetectedFace {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// HTTP client for the face embedding service
pub struct HttpFaceClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpFaceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FaceServiceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FaceServiceError::Unavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn image_part(path: &Path) -> Result<Part, FaceServiceError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| FaceServiceError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Part::bytes(bytes).file_name(file_name))
    }

    async fn image_form(images: &[PathBuf]) -> Result<Form, FaceServiceError> {
        let mut form = Form::new();
        for path in images {
            form = form.part("images", Self::image_part(path).await?);
        }
        Ok(form)
    }

    async fn post(&self, endpoint: &str, form: Form) -> Result<reqwest::Response, FaceServiceError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, "Calling face service");

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FaceServiceError::Unavailable(format!("timed out after {:?}", self.timeout))
                } else {
                    FaceServiceError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(FaceServiceError::Rejected {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        if !status.is_success() {
            return Err(FaceServiceError::Unavailable(format!("HTTP {}", status.as_u16())));
        }

        Ok(response)
    }
}

/// `detail` field of a JSON error body, or the raw body
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "no detail".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl FaceEmbeddingService for HttpFaceClient {
    async fn embed(&self, student_id: Uuid, images: &[PathBuf]) -> Result<StudentEmbedding, FaceServiceError> {
        let form = Self::image_form(images)
            .await?
            .text("studentId", student_id.to_string());

        let response: StudentEmbeddingResponse = self
            .post("/embedding/student", form)
            .await?
            .json()
            .await
            .map_err(|e| FaceServiceError::InvalidResponse(e.to_string()))?;

        let embedding = Embedding::new(response.embedding)
            .map_err(|e| FaceServiceError::InvalidResponse(e.to_string()))?;
        let images_used = response.images_used.unwrap_or(images.len());

        info!(student_id = %student_id, images_used, "Face embedding generated");
        Ok(StudentEmbedding {
            embedding,
            images_used,
        })
    }

    async fn detect_faces(&self, images: &[PathBuf]) -> Result<Vec<Embedding>, FaceServiceError> {
        let form = Self::image_form(images).await?;

        let detections: Vec<DetectedFace> = self
            .post("/embedding/classroom", form)
            .await?
            .json()
            .await
            .map_err(|e| FaceServiceError::InvalidResponse(e.to_string()))?;

        let total = detections.len();
        let faces: Vec<Embedding> = detections
            .into_iter()
            .filter_map(|face| match Embedding::new(face.embedding) {
                Ok(embedding) => Some(embedding),
                Err(e) => {
                    warn!("Discarding detected face: {}", e);
                    None
                }
            })
            .collect();

        info!(
            photos = images.len(),
            detected = total,
            usable = faces.len(),
            expected_dim = EMBEDDING_DIM,
            "Classroom face detection complete"
        );
        Ok(faces)
    }
}
