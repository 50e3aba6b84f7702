//! Append-only audit ledger rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    DisputeRaised,
    DisputeResult,
    AdminOverride,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::DisputeRaised => "DISPUTE_RAISED",
            AuditAction::DisputeResult => "DISPUTE_RESULT",
            AuditAction::AdminOverride => "ADMIN_OVERRIDE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DISPUTE_RAISED" => Some(AuditAction::DisputeRaised),
            "DISPUTE_RESULT" => Some(AuditAction::DisputeResult),
            "ADMIN_OVERRIDE" => Some(AuditAction::AdminOverride),
            _ => None,
        }
    }
}

/// Kind of entity an audit row points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEntityType {
    AttendanceDispute,
    AttendanceOverride,
}

impl AuditEntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEntityType::AttendanceDispute => "AttendanceDispute",
            AuditEntityType::AttendanceOverride => "AttendanceOverride",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AttendanceDispute" => Some(AuditEntityType::AttendanceDispute),
            "AttendanceOverride" => Some(AuditEntityType::AttendanceOverride),
            _ => None,
        }
    }
}

/// Row to be appended; id and timestamp are assigned on insert
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub action: AuditAction,
    pub performed_by: Uuid,
    pub performed_by_role: Role,
    pub entity_type: AuditEntityType,
    pub entity_id: Uuid,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    pub performed_by: Uuid,
    pub performed_by_role: Role,
    pub entity_type: AuditEntityType,
    pub entity_id: Uuid,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Optional filters for the paginated audit query
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub entity_type: Option<AuditEntityType>,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub logs: Vec<AuditLog>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}
