//! Student challenge against an ABSENT entry
//!
//! OPEN → FACULTY_APPROVED | FACULTY_REJECTED, and any state → ADMIN_OVERRIDDEN

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::Lifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    Open,
    FacultyApproved,
    FacultyRejected,
    AdminOverridden,
}

impl Lifecycle for DisputeStatus {
    const ENTITY: &'static str = "Dispute";
    const ALL: &'static [Self] = &[
        DisputeStatus::Open,
        DisputeStatus::FacultyApproved,
        DisputeStatus::FacultyRejected,
        DisputeStatus::AdminOverridden,
    ];

    fn allowed_next(self) -> &'static [Self] {
        match self {
            DisputeStatus::Open => &[
                DisputeStatus::FacultyApproved,
                DisputeStatus::FacultyRejected,
                DisputeStatus::AdminOverridden,
            ],
            DisputeStatus::FacultyApproved | DisputeStatus::FacultyRejected => {
                &[DisputeStatus::AdminOverridden]
            }
            // Repeated admin overrides re-stamp the dispute
            DisputeStatus::AdminOverridden => &[DisputeStatus::AdminOverridden],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            DisputeStatus::Open => "OPEN",
            DisputeStatus::FacultyApproved => "FACULTY_APPROVED",
            DisputeStatus::FacultyRejected => "FACULTY_REJECTED",
            DisputeStatus::AdminOverridden => "ADMIN_OVERRIDDEN",
        }
    }
}

/// Class owner's decision on an open dispute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    Approve,
    Reject,
}

impl Resolution {
    pub fn target_status(self) -> DisputeStatus {
        match self {
            Resolution::Approve => DisputeStatus::FacultyApproved,
            Resolution::Reject => DisputeStatus::FacultyRejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceDispute {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub student_id: Uuid,
    pub lecture_id: Uuid,
    pub class_id: Uuid,
    pub reason: String,
    pub status: DisputeStatus,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_resolves_once() {
        let approved = DisputeStatus::Open
            .transition(Resolution::Approve.target_status())
            .unwrap();
        assert!(approved
            .transition(DisputeStatus::FacultyRejected)
            .is_err());
    }

    #[test]
    fn test_admin_override_from_any_state() {
        for status in DisputeStatus::ALL {
            assert!(status.can_transition_to(DisputeStatus::AdminOverridden));
        }
    }

    #[test]
    fn test_resolution_wire_form() {
        let r: Resolution = serde_json::from_str("\"APPROVE\"").unwrap();
        assert_eq!(r, Resolution::Approve);
        assert!(serde_json::from_str::<Resolution>("\"MAYBE\"").is_err());
    }
}
