//! Domain models for the attendance service
//!
//! Status fields are closed enums implementing [`Lifecycle`], so every
//! allowed transition is listed next to the type.

pub mod actor;
pub mod attendance;
pub mod audit;
pub mod dispute;
pub mod embedding;
pub mod lecture;
pub mod lifecycle;
pub mod override_record;
pub mod pagination;
pub mod registry;

pub use actor::{Actor, Role};
pub use attendance::{
    AttendanceEntry, AttendanceRecord, AttendanceStatus, EffectiveAttendanceRow,
    LectureAttendanceSummary, StudentAttendanceRow, GENERATION_METHOD,
};
pub use audit::{AuditAction, AuditEntityType, AuditFilter, AuditLog, AuditPage, NewAuditLog};
pub use dispute::{AttendanceDispute, DisputeStatus, Resolution};
pub use embedding::{Embedding, EmbeddingError, EMBEDDING_DIM};
pub use lecture::{AttendancePhoto, Lecture, LectureDetail, LectureStatus};
pub use lifecycle::{InvalidTransition, Lifecycle};
pub use override_record::{effective_status, AttendanceOverride, OverrideHistoryItem};
pub use pagination::Pagination;
pub use registry::{ClassInfo, ClassStatus, EnrollmentStatus, TimetableSlot};
