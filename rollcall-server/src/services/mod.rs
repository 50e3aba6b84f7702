//! Attendance core services
//!
//! - [`LecturePipeline`]: lecture creation, photo intake, attendance generation
//! - [`GenerationQueue`] / [`GenerationWorker`]: background generation with retry
//! - [`FaceMatcher`] and [`FaceEmbeddingService`]: face matching and the remote model
//! - [`DisputeWorkflow`]: student disputes and their resolution
//! - [`OverrideReconciler`]: administrative overrides and effective attendance
//! - [`AuditLedger`]: read side of the audit trail
//! - [`FaceEnrollment`]: storing a student's reference embedding

pub mod audit_ledger;
pub mod dispute_service;
pub mod enrollment;
pub mod face_client;
pub mod face_matcher;
pub mod generation_queue;
pub mod lecture_pipeline;
pub mod override_service;
pub mod roster;

pub use audit_ledger::AuditLedger;
pub use dispute_service::DisputeWorkflow;
pub use enrollment::{EnrollmentOutcome, FaceEnrollment};
pub use face_client::{FaceEmbeddingService, FaceServiceError, HttpFaceClient, StudentEmbedding};
pub use face_matcher::{cosine_similarity, FaceMatcher, StudentMatch};
pub use generation_queue::{GenerationQueue, GenerationReceiver, GenerationWorker, JobState};
pub use lecture_pipeline::{GenerationSummary, LecturePipeline};
pub use override_service::OverrideReconciler;
pub use roster::{RosterProvider, SqliteRoster};

use crate::error::{AttendanceError, AttendanceResult};
use crate::models::{Actor, Role};

/// Fail with `Forbidden` unless the actor holds one of `roles`
pub(crate) fn require_role(actor: &Actor, roles: &[Role], action: &str) -> AttendanceResult<()> {
    if roles.contains(&actor.role) {
        Ok(())
    } else {
        Err(AttendanceError::Forbidden(format!(
            "Role {} cannot {}",
            actor.role, action
        )))
    }
}

/// Trimmed text, or `Validation` when blank
pub(crate) fn require_text(value: &str, field: &str) -> AttendanceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AttendanceError::Validation(format!("{} is required", field)))
    } else {
        Ok(trimmed.to_string())
    }
}
