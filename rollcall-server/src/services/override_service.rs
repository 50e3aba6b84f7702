//! Override reconciliation
//!
//! Administrative corrections are layered over immutable entries. Each entry
//! has at most one override row; a new correction shifts the row's current
//! `new_status` into `previous_status`. The effective status is computed on
//! read and never stored.

use chrono::{DateTime, Utc};
use rollcall_common::events::{AttendanceEvent, EventBus};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{require_role, require_text};
use crate::db::overrides::OverrideChange;
use crate::db::{attendance, audit, disputes, overrides};
use crate::error::{AttendanceError, AttendanceResult};
use crate::models::{
    effective_status, Actor, AttendanceOverride, AttendanceStatus, AuditAction, AuditEntityType,
    DisputeStatus, EffectiveAttendanceRow, Lifecycle, NewAuditLog, OverrideHistoryItem, Role,
};

/// Rows returned by the override history view
pub const OVERRIDE_HISTORY_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct OverrideReconciler {
    db: SqlitePool,
    event_bus: EventBus,
}

impl OverrideReconciler {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    /// Set an entry's effective status directly (ADMIN or HOD)
    ///
    /// Any dispute on the entry is forced to ADMIN_OVERRIDDEN.
    pub async fn admin_override(
        &self,
        actor: &Actor,
        entry_id: Uuid,
        new_status: AttendanceStatus,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AttendanceResult<AttendanceOverride> {
        require_role(actor, &[Role::Admin, Role::Hod], "override attendance")?;
        let reason = require_text(reason, "Reason")?;

        let entry = attendance::load_entry(&self.db, entry_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Attendance entry {}", entry_id)))?;

        let mut tx = self.db.begin().await?;

        let override_row = overrides::upsert_override(
            &mut *tx,
            &OverrideChange {
                entry_id,
                dispute_id: None,
                entry_status: entry.status,
                new_status,
                reason: reason.clone(),
                approved_by: actor.user_id,
                approved_by_role: actor.role,
                approved_at: now,
            },
        )
        .await?;

        let open_disputes = disputes::disputes_for_entry(&mut *tx, entry_id).await?;
        for dispute in &open_disputes {
            dispute.status.transition(DisputeStatus::AdminOverridden)?;
        }
        if !open_disputes.is_empty() {
            disputes::force_admin_overridden(&mut *tx, entry_id, actor.user_id, now).await?;
        }

        audit::append(
            &mut *tx,
            NewAuditLog {
                action: AuditAction::AdminOverride,
                performed_by: actor.user_id,
                performed_by_role: actor.role,
                entity_type: AuditEntityType::AttendanceOverride,
                entity_id: override_row.id,
                payload: json!({
                    "entry_id": entry_id,
                    "previous_status": override_row.previous_status,
                    "new_status": override_row.new_status,
                    "reason": reason,
                }),
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!(
            entry_id = %entry_id,
            override_id = %override_row.id,
            previous = override_row.previous_status.as_str(),
            new = override_row.new_status.as_str(),
            disputes_closed = open_disputes.len(),
            "Attendance overridden"
        );
        self.event_bus.emit_lossy(AttendanceEvent::AttendanceOverridden {
            entry_id,
            override_id: override_row.id,
            timestamp: now,
        });

        Ok(override_row)
    }

    /// Effective status of a single entry
    pub async fn effective_status_of(&self, entry_id: Uuid) -> AttendanceResult<AttendanceStatus> {
        let entry = attendance::load_entry(&self.db, entry_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Attendance entry {}", entry_id)))?;
        let override_row = overrides::load_override_for_entry(&self.db, entry_id).await?;
        Ok(effective_status(&entry, override_row.as_ref()))
    }

    /// The calling student's entries with overrides applied, newest first
    pub async fn effective_attendance(&self, actor: &Actor) -> AttendanceResult<Vec<EffectiveAttendanceRow>> {
        require_role(actor, &[Role::Student], "view own attendance")?;

        let rows = attendance::entries_for_student(&self.db, actor.user_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| EffectiveAttendanceRow {
                entry_id: row.entry.id,
                lecture_id: row.entry.lecture_id,
                class_id: row.entry.class_id,
                date: row.date,
                original_status: row.entry.status,
                effective_status: effective_status(&row.entry, row.override_row.as_ref()),
                is_overridden: row.override_row.is_some(),
                override_reason: row.override_row.map(|o| o.reason),
                confidence: row.entry.confidence_score,
            })
            .collect())
    }

    /// Most recent overrides (ADMIN or HOD)
    ///
    /// An HOD with a known department only sees that department's classes.
    pub async fn override_history(
        &self,
        actor: &Actor,
        department_id: Option<Uuid>,
    ) -> AttendanceResult<Vec<OverrideHistoryItem>> {
        require_role(actor, &[Role::Admin, Role::Hod], "view override history")?;

        let department = match (actor.role, actor.department_id) {
            (Role::Hod, Some(own)) => {
                if department_id.is_some_and(|requested| requested != own) {
                    return Err(AttendanceError::Forbidden(
                        "HOD can only view their own department".into(),
                    ));
                }
                Some(own)
            }
            _ => department_id,
        };

        Ok(overrides::override_history(&self.db, department, OVERRIDE_HISTORY_LIMIT).await?)
    }
}
