//! Lecture occurrence and its classroom photos
//!
//! CREATED → PHOTO_UPLOADED → ATTENDANCE_GENERATED → LOCKED

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::Lifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LectureStatus {
    Created,
    PhotoUploaded,
    AttendanceGenerated,
    Locked,
}

impl Lifecycle for LectureStatus {
    const ENTITY: &'static str = "Lecture";
    const ALL: &'static [Self] = &[
        LectureStatus::Created,
        LectureStatus::PhotoUploaded,
        LectureStatus::AttendanceGenerated,
        LectureStatus::Locked,
    ];

    fn allowed_next(self) -> &'static [Self] {
        match self {
            LectureStatus::Created => &[LectureStatus::PhotoUploaded],
            LectureStatus::PhotoUploaded => &[LectureStatus::AttendanceGenerated],
            LectureStatus::AttendanceGenerated => &[LectureStatus::Locked],
            LectureStatus::Locked => &[],
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            LectureStatus::Created => "CREATED",
            LectureStatus::PhotoUploaded => "PHOTO_UPLOADED",
            LectureStatus::AttendanceGenerated => "ATTENDANCE_GENERATED",
            LectureStatus::Locked => "LOCKED",
        }
    }
}

impl LectureStatus {
    /// Attendance already exists for the lecture
    pub fn has_attendance(self) -> bool {
        matches!(self, LectureStatus::AttendanceGenerated | LectureStatus::Locked)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lecture {
    pub id: Uuid,
    pub class_id: Uuid,
    pub timetable_slot_id: Uuid,
    pub date: NaiveDate,
    pub created_by: Uuid,
    pub status: LectureStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendancePhoto {
    pub id: Uuid,
    pub lecture_id: Uuid,
    pub storage_url: String,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

/// Lecture with its photos, as returned by the detail view
#[derive(Debug, Clone, Serialize)]
pub struct LectureDetail {
    #[serde(flatten)]
    pub lecture: Lecture,
    pub photos: Vec<AttendancePhoto>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lecture_moves_forward_only() {
        assert!(LectureStatus::Created.can_transition_to(LectureStatus::PhotoUploaded));
        assert!(!LectureStatus::PhotoUploaded.can_transition_to(LectureStatus::Created));
        assert!(!LectureStatus::Created.can_transition_to(LectureStatus::AttendanceGenerated));
        assert!(LectureStatus::Locked.is_terminal());
    }

    #[test]
    fn test_serde_matches_stored_form() {
        let json = serde_json::to_string(&LectureStatus::PhotoUploaded).unwrap();
        assert_eq!(json, "\"PHOTO_UPLOADED\"");
        assert!(LectureStatus::Locked.has_attendance());
        assert!(!LectureStatus::PhotoUploaded.has_attendance());
    }
}
