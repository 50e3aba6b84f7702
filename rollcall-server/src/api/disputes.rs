//! Dispute endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rollcall_common::time;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Actor, AttendanceDispute, Resolution};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RaiseDisputeRequest {
    pub entry_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveDisputeRequest {
    /// APPROVE or REJECT
    pub action: Resolution,
    pub comment: String,
}

/// POST /disputes
pub async fn raise_dispute(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<RaiseDisputeRequest>,
) -> ApiResult<(StatusCode, Json<AttendanceDispute>)> {
    let dispute = state
        .disputes
        .raise(&actor, request.entry_id, &request.reason, time::now())
        .await?;
    Ok((StatusCode::CREATED, Json(dispute)))
}

/// GET /disputes/my
pub async fn my_disputes(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Vec<AttendanceDispute>>> {
    Ok(Json(state.disputes.my_disputes(&actor).await?))
}

/// GET /disputes/class/:class_id
pub async fn class_disputes(
    State(state): State<AppState>,
    actor: Actor,
    Path(class_id): Path<Uuid>,
) -> ApiResult<Json<Vec<AttendanceDispute>>> {
    Ok(Json(state.disputes.class_disputes(&actor, class_id).await?))
}

/// POST /disputes/:id/resolve
pub async fn resolve_dispute(
    State(state): State<AppState>,
    actor: Actor,
    Path(dispute_id): Path<Uuid>,
    Json(request): Json<ResolveDisputeRequest>,
) -> ApiResult<Json<AttendanceDispute>> {
    let dispute = state
        .disputes
        .resolve(&actor, dispute_id, request.action, &request.comment, time::now())
        .await?;
    Ok(Json(dispute))
}

pub fn dispute_routes() -> Router<AppState> {
    Router::new()
        .route("/disputes", post(raise_dispute))
        .route("/disputes/my", get(my_disputes))
        .route("/disputes/class/:class_id", get(class_disputes))
        .route("/disputes/:id/resolve", post(resolve_dispute))
}
