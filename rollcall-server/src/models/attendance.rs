//! Immutable attendance facts and their read views

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag stored on every generated record
pub const GENERATION_METHOD: &str = "PHOTO_CLUSTER_V1";

/// Per-student classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRESENT" => Some(AttendanceStatus::Present),
            "ABSENT" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }

    pub fn parse_stored(s: &str) -> rollcall_common::Result<Self> {
        Self::parse(s).ok_or_else(|| {
            rollcall_common::Error::Internal(format!("Unknown attendance status '{}'", s))
        })
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One per lecture, created exactly once when generation completes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub lecture_id: Uuid,
    pub class_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub generation_method: String,
    pub confidence_score: f64,
}

/// Immutable classification of one student for one lecture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub id: Uuid,
    pub record_id: Uuid,
    pub lecture_id: Uuid,
    pub class_id: Uuid,
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    pub confidence_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Present/absent counts of one locked lecture
#[derive(Debug, Clone, Serialize)]
pub struct LectureAttendanceSummary {
    pub lecture_id: Uuid,
    pub date: NaiveDate,
    pub record_id: Uuid,
    pub confidence_score: f64,
    pub present: i64,
    pub absent: i64,
    /// Counts after applying overrides
    pub effective_present: i64,
    pub effective_absent: i64,
}

/// Student's entry joined with its lecture date
#[derive(Debug, Clone, Serialize)]
pub struct StudentAttendanceRow {
    pub entry_id: Uuid,
    pub lecture_id: Uuid,
    pub class_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub confidence_score: f64,
}

/// Entry with its override applied
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveAttendanceRow {
    pub entry_id: Uuid,
    pub lecture_id: Uuid,
    pub class_id: Uuid,
    pub date: NaiveDate,
    pub original_status: AttendanceStatus,
    pub effective_status: AttendanceStatus,
    pub is_overridden: bool,
    pub override_reason: Option<String>,
    pub confidence: f64,
}
