//! Face enrollment endpoint

use axum::{extract::State, routing::post, Json, Router};
use rollcall_common::time;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::models::Actor;
use crate::services::EnrollmentOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    /// Storage paths of the student's reference photos
    pub image_paths: Vec<String>,
}

/// POST /face/enroll
pub async fn enroll_face(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<EnrollRequest>,
) -> ApiResult<Json<EnrollmentOutcome>> {
    let outcome = state
        .enrollment
        .enroll(&actor, request.image_paths, time::now())
        .await?;
    Ok(Json(outcome))
}

pub fn face_routes() -> Router<AppState> {
    Router::new().route("/face/enroll", post(enroll_face))
}
