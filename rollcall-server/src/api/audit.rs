//! Audit ledger endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Actor, AuditAction, AuditEntityType, AuditFilter, AuditLog, AuditPage, Pagination};
use crate::AppState;

/// Query string for `/audit/logs`; filters arrive as raw text
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    /// Filter by performing user
    pub actor: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl AuditLogQuery {
    /// Blank values mean "no filter"; unknown values are rejected
    pub fn to_filter(&self) -> Result<AuditFilter, ApiError> {
        let non_blank = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned);

        let action = non_blank(&self.action)
            .map(|a| {
                AuditAction::parse(&a).ok_or_else(|| ApiError::BadRequest(format!("Unknown audit action '{}'", a)))
            })
            .transpose()?;
        let entity_type = non_blank(&self.entity_type)
            .map(|t| {
                AuditEntityType::parse(&t)
                    .ok_or_else(|| ApiError::BadRequest(format!("Unknown entity type '{}'", t)))
            })
            .transpose()?;
        let performed_by = non_blank(&self.actor)
            .map(|a| Uuid::parse_str(&a).map_err(|_| ApiError::BadRequest(format!("Invalid actor id '{}'", a))))
            .transpose()?;

        Ok(AuditFilter {
            action,
            entity_type,
            performed_by,
        })
    }
}

/// GET /audit/logs
pub async fn audit_logs(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<AuditPage>> {
    let filter = query.to_filter()?;
    let page = Pagination::new(query.page, query.limit);
    Ok(Json(state.audit.query(&actor, &filter, page).await?))
}

/// GET /audit/recent
pub async fn recent_activity(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Vec<AuditLog>>> {
    Ok(Json(state.audit.recent(&actor).await?))
}

pub fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/audit/logs", get(audit_logs))
        .route("/audit/recent", get(recent_activity))
}
