//! Administrative override endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use rollcall_common::time;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Actor, AttendanceOverride, AttendanceStatus, OverrideHistoryItem};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub new_status: AttendanceStatus,
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverrideHistoryQuery {
    pub department_id: Option<Uuid>,
}

/// POST /overrides/:entry_id
pub async fn admin_override(
    State(state): State<AppState>,
    actor: Actor,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<OverrideRequest>,
) -> ApiResult<Json<AttendanceOverride>> {
    let override_row = state
        .overrides
        .admin_override(&actor, entry_id, request.new_status, &request.reason, time::now())
        .await?;
    Ok(Json(override_row))
}

/// GET /overrides
pub async fn override_history(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<OverrideHistoryQuery>,
) -> ApiResult<Json<Vec<OverrideHistoryItem>>> {
    Ok(Json(
        state.overrides.override_history(&actor, query.department_id).await?,
    ))
}

pub fn override_routes() -> Router<AppState> {
    Router::new()
        .route("/overrides", get(override_history))
        .route("/overrides/:entry_id", post(admin_override))
}
