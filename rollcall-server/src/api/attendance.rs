//! Attendance read views

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Actor, EffectiveAttendanceRow, LectureAttendanceSummary, StudentAttendanceRow};
use crate::AppState;

/// GET /classes/:id/attendance
pub async fn class_attendance(
    State(state): State<AppState>,
    actor: Actor,
    Path(class_id): Path<Uuid>,
) -> ApiResult<Json<Vec<LectureAttendanceSummary>>> {
    Ok(Json(state.pipeline.class_attendance(&actor, class_id).await?))
}

/// GET /attendance/my
pub async fn my_attendance(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Vec<StudentAttendanceRow>>> {
    Ok(Json(state.pipeline.student_attendance(&actor).await?))
}

/// GET /attendance/effective/my
///
/// Same entries as `/attendance/my` with overrides applied.
pub async fn my_effective_attendance(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Vec<EffectiveAttendanceRow>>> {
    Ok(Json(state.overrides.effective_attendance(&actor).await?))
}

pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/classes/:id/attendance", get(class_attendance))
        .route("/attendance/my", get(my_attendance))
        .route("/attendance/effective/my", get(my_effective_attendance))
}
