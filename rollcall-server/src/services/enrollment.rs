//! Face enrollment
//!
//! Sends a student's reference images to the embedding service and stores
//! the returned vector, overwriting any previous one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::face_client::FaceEmbeddingService;
use super::require_role;
use crate::config::AttendanceSettings;
use crate::db::embeddings;
use crate::error::{AttendanceError, AttendanceResult};
use crate::models::{Actor, Role};

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentOutcome {
    pub images_used: usize,
    pub message: String,
}

#[derive(Clone)]
pub struct FaceEnrollment {
    db: SqlitePool,
    face: Arc<dyn FaceEmbeddingService>,
    settings: Arc<AttendanceSettings>,
}

impl FaceEnrollment {
    pub fn new(db: SqlitePool, face: Arc<dyn FaceEmbeddingService>, settings: Arc<AttendanceSettings>) -> Self {
        Self { db, face, settings }
    }

    /// Enroll the calling student's face from stored image files
    pub async fn enroll(
        &self,
        actor: &Actor,
        image_paths: Vec<String>,
        now: DateTime<Utc>,
    ) -> AttendanceResult<EnrollmentOutcome> {
        require_role(actor, &[Role::Student], "enroll a face")?;

        let paths: Vec<PathBuf> = image_paths
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect();
        if paths.len() < self.settings.min_enrollment_images {
            return Err(AttendanceError::Validation(format!(
                "At least {} face images are required, got {}",
                self.settings.min_enrollment_images,
                paths.len()
            )));
        }

        let result = self.face.embed(actor.user_id, &paths).await?;
        embeddings::upsert_embedding(&self.db, actor.user_id, &result.embedding, now).await?;

        info!(student_id = %actor.user_id, images_used = result.images_used, "Face enrolled");
        Ok(EnrollmentOutcome {
            images_used: result.images_used,
            message: "Face enrolled successfully".to_string(),
        })
    }
}
