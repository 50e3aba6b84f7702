//! Read model of the class/enrollment registry
//!
//! Classes, timetable slots and enrollments are managed elsewhere; the
//! attendance core only reads them.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::Lifecycle;

/// Class approval lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassStatus {
    Draft,
    PendingHodApproval,
    Active,
    Rejected,
    Archived,
}

impl Lifecycle for ClassStatus {
    const ENTITY: &'static str = "Class";
    const ALL: &'static [Self] = &[
        ClassStatus::Draft,
        ClassStatus::PendingHodApproval,
        ClassStatus::Active,
        ClassStatus::Rejected,
        ClassStatus::Archived,
    ];

    fn allowed_next(self) -> &'static [Self] {
        match self {
            ClassStatus::Draft => &[ClassStatus::PendingHodApproval],
            ClassStatus::PendingHodApproval => &[ClassStatus::Active, ClassStatus::Rejected],
            ClassStatus::Rejected => &[ClassStatus::PendingHodApproval],
            ClassStatus::Active => &[ClassStatus::Archived],
            ClassStatus::Archived => &[],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ClassStatus::Draft => "DRAFT",
            ClassStatus::PendingHodApproval => "PENDING_HOD_APPROVAL",
            ClassStatus::Active => "ACTIVE",
            ClassStatus::Rejected => "REJECTED",
            ClassStatus::Archived => "ARCHIVED",
        }
    }
}

/// Student enrollment lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Requested,
    Approved,
    Rejected,
    Suspended,
}

impl Lifecycle for EnrollmentStatus {
    const ENTITY: &'static str = "Enrollment";
    const ALL: &'static [Self] = &[
        EnrollmentStatus::Requested,
        EnrollmentStatus::Approved,
        EnrollmentStatus::Rejected,
        EnrollmentStatus::Suspended,
    ];

    fn allowed_next(self) -> &'static [Self] {
        match self {
            EnrollmentStatus::Requested => &[EnrollmentStatus::Approved, EnrollmentStatus::Rejected],
            EnrollmentStatus::Approved => &[EnrollmentStatus::Suspended],
            EnrollmentStatus::Rejected | EnrollmentStatus::Suspended => &[],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Requested => "REQUESTED",
            EnrollmentStatus::Approved => "APPROVED",
            EnrollmentStatus::Rejected => "REJECTED",
            EnrollmentStatus::Suspended => "SUSPENDED",
        }
    }
}

/// What the core needs to know about a class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassInfo {
    pub id: Uuid,
    pub title: String,
    pub faculty_id: Uuid,
    pub department_id: Option<Uuid>,
    pub status: ClassStatus,
}

impl ClassInfo {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.faculty_id == user_id
    }

    pub fn is_active(&self) -> bool {
        self.status == ClassStatus::Active
    }
}

/// One weekly timetable slot of a class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimetableSlot {
    pub id: Uuid,
    pub class_id: Uuid,
    /// Sunday = 0 through Saturday = 6
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_approval_path() {
        let status = ClassStatus::Draft
            .transition(ClassStatus::PendingHodApproval)
            .and_then(|s| s.transition(ClassStatus::Active))
            .unwrap();
        assert_eq!(status, ClassStatus::Active);
        assert!(!ClassStatus::Draft.can_transition_to(ClassStatus::Active));
        assert!(ClassStatus::Archived.is_terminal());
    }

    #[test]
    fn test_enrollment_cannot_leave_rejected() {
        let err = EnrollmentStatus::Rejected
            .transition(EnrollmentStatus::Approved)
            .unwrap_err();
        assert_eq!(err.from, "REJECTED");
        assert_eq!(err.to, "APPROVED");
    }

    #[test]
    fn test_parse_matches_as_str() {
        for status in ClassStatus::ALL {
            assert_eq!(ClassStatus::parse(status.as_str()), Some(*status));
        }
        assert_eq!(EnrollmentStatus::parse("approved"), None);
    }
}
