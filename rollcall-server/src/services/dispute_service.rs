//! Dispute workflow
//!
//! A student challenges their own ABSENT entry within the dispute window.
//! The class owner approves (creating an override to PRESENT) or rejects.
//! Every state change appends an audit row in the same transaction.

use chrono::{DateTime, Utc};
use rollcall_common::events::{AttendanceEvent, EventBus};
use rollcall_common::{time, uuid_utils};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::roster::RosterProvider;
use super::{require_role, require_text};
use crate::config::AttendanceSettings;
use crate::db::overrides::OverrideChange;
use crate::db::{attendance, audit, disputes, lectures, overrides};
use crate::error::{conflict_on_unique, AttendanceError, AttendanceResult};
use crate::models::{
    Actor, AttendanceDispute, AttendanceStatus, AuditAction, AuditEntityType, DisputeStatus,
    Lifecycle, NewAuditLog, Resolution, Role,
};

#[derive(Clone)]
pub struct DisputeWorkflow {
    db: SqlitePool,
    roster: Arc<dyn RosterProvider>,
    settings: Arc<AttendanceSettings>,
    event_bus: EventBus,
}

impl DisputeWorkflow {
    pub fn new(
        db: SqlitePool,
        roster: Arc<dyn RosterProvider>,
        settings: Arc<AttendanceSettings>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            roster,
            settings,
            event_bus,
        }
    }

    /// Raise a dispute against the caller's own ABSENT entry
    pub async fn raise(
        &self,
        actor: &Actor,
        entry_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AttendanceResult<AttendanceDispute> {
        require_role(actor, &[Role::Student], "raise disputes")?;
        let reason = require_text(reason, "Reason")?;

        let entry = attendance::load_entry(&self.db, entry_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Attendance entry {}", entry_id)))?;
        if entry.student_id != actor.user_id {
            return Err(AttendanceError::Forbidden(
                "Cannot dispute another student's attendance".into(),
            ));
        }
        if entry.status != AttendanceStatus::Absent {
            return Err(AttendanceError::InvalidState(
                "Only ABSENT entries can be disputed".into(),
            ));
        }

        let lecture = lectures::load_lecture(&self.db, entry.lecture_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Lecture {}", entry.lecture_id)))?;
        let within_window = time::within_hours_of_date(
            lecture.date,
            self.settings.dispute_window_hours,
            now,
            self.settings.campus_utc_offset_minutes,
        )?;
        if !within_window {
            return Err(AttendanceError::WindowExpired(format!(
                "Dispute window ({} hours) has expired",
                self.settings.dispute_window_hours
            )));
        }

        if let Some(existing) = disputes::disputes_for_entry(&self.db, entry_id).await?.first() {
            return Err(AttendanceError::Conflict(format!(
                "Dispute already exists with status {}",
                existing.status.as_str()
            )));
        }

        let dispute = AttendanceDispute {
            id: uuid_utils::generate(),
            entry_id,
            student_id: actor.user_id,
            lecture_id: lecture.id,
            class_id: lecture.class_id,
            reason,
            status: DisputeStatus::Open,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
        };

        let mut tx = self.db.begin().await?;
        disputes::insert_dispute(&mut *tx, &dispute)
            .await
            .map_err(|e| conflict_on_unique(e, "Dispute already exists for this entry"))?;
        audit::append(
            &mut *tx,
            NewAuditLog {
                action: AuditAction::DisputeRaised,
                performed_by: actor.user_id,
                performed_by_role: actor.role,
                entity_type: AuditEntityType::AttendanceDispute,
                entity_id: dispute.id,
                payload: json!({ "reason": dispute.reason, "entry_id": entry_id }),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(dispute_id = %dispute.id, entry_id = %entry_id, "Dispute raised");
        self.event_bus.emit_lossy(AttendanceEvent::DisputeRaised {
            dispute_id: dispute.id,
            entry_id,
            timestamp: now,
        });

        Ok(dispute)
    }

    /// Approve or reject an OPEN dispute (class owner only)
    pub async fn resolve(
        &self,
        actor: &Actor,
        dispute_id: Uuid,
        resolution: Resolution,
        comment: &str,
        now: DateTime<Utc>,
    ) -> AttendanceResult<AttendanceDispute> {
        require_role(actor, &[Role::Faculty], "resolve disputes")?;
        let comment = require_text(comment, "Comment")?;

        let dispute = disputes::load_dispute(&self.db, dispute_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Dispute {}", dispute_id)))?;
        let class = self
            .roster
            .class(dispute.class_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Class {}", dispute.class_id)))?;
        if !class.is_owned_by(actor.user_id) {
            return Err(AttendanceError::Forbidden(
                "Only the class faculty can resolve this dispute".into(),
            ));
        }

        let target = dispute.status.transition(resolution.target_status()).map_err(|_| {
            AttendanceError::InvalidState(format!(
                "Dispute is already resolved (status {})",
                dispute.status.as_str()
            ))
        })?;

        let mut tx = self.db.begin().await?;
        let resolved = disputes::resolve_open(&mut *tx, dispute_id, target, actor.user_id, now).await?;
        if !resolved {
            return Err(AttendanceError::InvalidState("Dispute is already resolved".into()));
        }

        if resolution == Resolution::Approve {
            overrides::upsert_override(
                &mut *tx,
                &OverrideChange {
                    entry_id: dispute.entry_id,
                    dispute_id: Some(dispute_id),
                    entry_status: AttendanceStatus::Absent,
                    new_status: AttendanceStatus::Present,
                    reason: format!("Dispute Approved: {}", comment),
                    approved_by: actor.user_id,
                    approved_by_role: Role::Faculty,
                    approved_at: now,
                },
            )
            .await?;
        }

        audit::append(
            &mut *tx,
            NewAuditLog {
                action: AuditAction::DisputeResult,
                performed_by: actor.user_id,
                performed_by_role: actor.role,
                entity_type: AuditEntityType::AttendanceDispute,
                entity_id: dispute_id,
                payload: json!({ "action": resolution, "comment": comment }),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            dispute_id = %dispute_id,
            status = target.as_str(),
            "Dispute resolved"
        );
        self.event_bus.emit_lossy(AttendanceEvent::DisputeResolved {
            dispute_id,
            approved: resolution == Resolution::Approve,
            timestamp: now,
        });

        Ok(AttendanceDispute {
            status: target,
            resolved_by: Some(actor.user_id),
            resolved_at: Some(now),
            ..dispute
        })
    }

    /// The calling student's disputes, newest first
    pub async fn my_disputes(&self, actor: &Actor) -> AttendanceResult<Vec<AttendanceDispute>> {
        require_role(actor, &[Role::Student], "list own disputes")?;
        Ok(disputes::disputes_for_student(&self.db, actor.user_id).await?)
    }

    /// A class's disputes, OPEN first
    pub async fn class_disputes(&self, actor: &Actor, class_id: Uuid) -> AttendanceResult<Vec<AttendanceDispute>> {
        let class = self
            .roster
            .class(class_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Class {}", class_id)))?;

        match actor.role {
            Role::Admin | Role::Hod => {}
            Role::Faculty if class.is_owned_by(actor.user_id) => {}
            _ => {
                return Err(AttendanceError::Forbidden(
                    "You can only view disputes for your own class".into(),
                ))
            }
        }

        Ok(disputes::disputes_for_class(&self.db, class_id).await?)
    }
}
