//! rollcall-server library interface
//!
//! Exposes the services and router for the binary and for integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use rollcall_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AttendanceSettings;
use crate::error::AttendanceResult;
use crate::services::{
    AuditLedger, DisputeWorkflow, FaceEmbeddingService, FaceEnrollment, GenerationQueue, GenerationWorker,
    LecturePipeline, OverrideReconciler, RosterProvider, SqliteRoster,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Attendance lifecycle events
    pub event_bus: EventBus,
    pub settings: Arc<AttendanceSettings>,
    pub pipeline: LecturePipeline,
    pub disputes: DisputeWorkflow,
    pub overrides: OverrideReconciler,
    pub audit: AuditLedger,
    pub enrollment: FaceEnrollment,
    /// Stops the generation worker and pending retries
    pub cancel: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the services together and start the generation worker
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        settings: AttendanceSettings,
        face: Arc<dyn FaceEmbeddingService>,
    ) -> Self {
        let settings = Arc::new(settings);
        let roster: Arc<dyn RosterProvider> = Arc::new(SqliteRoster::new(db.clone()));
        let (queue, receiver) = GenerationQueue::new();
        let cancel = CancellationToken::new();

        let pipeline = LecturePipeline::new(
            db.clone(),
            roster.clone(),
            face.clone(),
            settings.clone(),
            event_bus.clone(),
            queue,
        );
        GenerationWorker::new(
            receiver,
            pipeline.clone(),
            settings.clone(),
            event_bus.clone(),
            cancel.clone(),
        )
        .spawn();

        Self {
            disputes: DisputeWorkflow::new(db.clone(), roster, settings.clone(), event_bus.clone()),
            overrides: OverrideReconciler::new(db.clone(), event_bus.clone()),
            audit: AuditLedger::new(db.clone()),
            enrollment: FaceEnrollment::new(db.clone(), face, settings.clone()),
            pipeline,
            db,
            event_bus,
            settings,
            cancel,
            startup_time: Utc::now(),
        }
    }

    /// Re-queue lectures left in PHOTO_UPLOADED by a previous run
    ///
    /// Returns the number of jobs queued.
    pub async fn resume_pending_generation(&self) -> AttendanceResult<usize> {
        let pending = self.pipeline.pending_generation().await?;
        let mut queued = 0;
        for lecture_id in &pending {
            if self.pipeline.queue().enqueue(*lecture_id).await {
                queued += 1;
            }
        }
        if queued > 0 {
            info!(queued, "Resumed pending attendance generation");
        }
        Ok(queued)
    }

    /// Stop background work
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::lecture_routes())
        .merge(api::attendance_routes())
        .merge(api::dispute_routes())
        .merge(api::override_routes())
        .merge(api::audit_routes())
        .merge(api::face_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
