//! Correction layered over an immutable entry
//!
//! At most one row per entry. Each correction moves the prior `new_status`
//! into `previous_status`, so the row always remembers one hop back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::Role;
use super::attendance::{AttendanceEntry, AttendanceStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceOverride {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub dispute_id: Option<Uuid>,
    pub previous_status: AttendanceStatus,
    pub new_status: AttendanceStatus,
    pub reason: String,
    pub approved_by: Uuid,
    pub approved_by_role: Role,
    pub approved_at: DateTime<Utc>,
}

/// Override joined with the entry it corrects
#[derive(Debug, Clone, Serialize)]
pub struct OverrideHistoryItem {
    #[serde(flatten)]
    pub override_row: AttendanceOverride,
    pub student_id: Uuid,
    pub lecture_id: Uuid,
    pub class_id: Uuid,
}

/// Status the student actually carries for `entry`
pub fn effective_status(
    entry: &AttendanceEntry,
    override_row: Option<&AttendanceOverride>,
) -> AttendanceStatus {
    match override_row {
        Some(o) => o.new_status,
        None => entry.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: AttendanceStatus) -> AttendanceEntry {
        AttendanceEntry {
            id: Uuid::new_v4(),
            record_id: Uuid::new_v4(),
            lecture_id: Uuid::new_v4(),
            class_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            status,
            confidence_score: 0.1,
            created_at: Utc::now(),
        }
    }

    fn override_for(entry: &AttendanceEntry, new_status: AttendanceStatus) -> AttendanceOverride {
        AttendanceOverride {
            id: Uuid::new_v4(),
            entry_id: entry.id,
            dispute_id: None,
            previous_status: entry.status,
            new_status,
            reason: "video review".to_string(),
            approved_by: Uuid::new_v4(),
            approved_by_role: Role::Admin,
            approved_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_override_keeps_entry_status() {
        for status in [AttendanceStatus::Present, AttendanceStatus::Absent] {
            assert_eq!(effective_status(&entry(status), None), status);
        }
    }

    #[test]
    fn test_override_wins() {
        let e = entry(AttendanceStatus::Absent);
        let o = override_for(&e, AttendanceStatus::Present);
        assert_eq!(effective_status(&e, Some(&o)), AttendanceStatus::Present);
        // Pure: the entry itself is untouched
        assert_eq!(e.status, AttendanceStatus::Absent);
        assert_eq!(effective_status(&e, Some(&o)), AttendanceStatus::Present);
    }
}
