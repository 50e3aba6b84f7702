//! Lecture endpoints
//!
//! Photo uploads answer 202 Accepted: attendance generation runs on the
//! background queue and its progress shows up in the lecture detail.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rollcall_common::time;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Actor, Lecture, LectureDetail};
use crate::services::JobState;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateLectureRequest {
    pub class_id: Uuid,
    pub timetable_slot_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UploadPhotosRequest {
    /// Storage locations of already-stored photos
    pub photos: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LectureDetailResponse {
    #[serde(flatten)]
    pub detail: LectureDetail,
    pub photo_count: usize,
    /// `None` when no generation job ran since startup
    pub generation: Option<JobState>,
}

/// POST /lectures
pub async fn create_lecture(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateLectureRequest>,
) -> ApiResult<(StatusCode, Json<Lecture>)> {
    let lecture = state
        .pipeline
        .create_lecture(&actor, request.class_id, request.timetable_slot_id, time::now())
        .await?;
    Ok((StatusCode::CREATED, Json(lecture)))
}

/// GET /lectures/today
pub async fn todays_lectures(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Vec<Lecture>>> {
    let lectures = state.pipeline.todays_lectures(&actor, time::now()).await?;
    Ok(Json(lectures))
}

/// GET /lectures/:id
pub async fn lecture_detail(
    State(state): State<AppState>,
    actor: Actor,
    Path(lecture_id): Path<Uuid>,
) -> ApiResult<Json<LectureDetailResponse>> {
    let detail = state.pipeline.lecture_detail(&actor, lecture_id).await?;
    let generation = state.pipeline.queue().job_state(lecture_id).await;

    Ok(Json(LectureDetailResponse {
        photo_count: detail.photos.len(),
        detail,
        generation,
    }))
}

/// POST /lectures/:id/photos
pub async fn upload_photos(
    State(state): State<AppState>,
    actor: Actor,
    Path(lecture_id): Path<Uuid>,
    Json(request): Json<UploadPhotosRequest>,
) -> ApiResult<(StatusCode, Json<Lecture>)> {
    info!(lecture_id = %lecture_id, count = request.photos.len(), "Photo upload requested");
    let lecture = state
        .pipeline
        .upload_photos(&actor, lecture_id, request.photos, time::now())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(lecture)))
}

pub fn lecture_routes() -> Router<AppState> {
    Router::new()
        .route("/lectures", post(create_lecture))
        .route("/lectures/today", get(todays_lectures))
        .route("/lectures/:id", get(lecture_detail))
        .route("/lectures/:id/photos", post(upload_photos))
}
