//! Lecture attendance pipeline
//!
//! CREATED → PHOTO_UPLOADED → ATTENDANCE_GENERATED → LOCKED
//!
//! Lectures are created on the day of their slot, photos are appended by the
//! creator, and each upload queues attendance generation. Generation writes
//! the record, every entry and the lecture transition in one transaction, so
//! a lecture is either "not yet locked" or fully locked.

use chrono::{DateTime, Duration, Utc};
use rollcall_common::events::{AttendanceEvent, EventBus};
use rollcall_common::{time, uuid_utils};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::face_client::FaceEmbeddingService;
use super::face_matcher::{aggregate_confidence, FaceMatcher};
use super::generation_queue::GenerationQueue;
use super::require_role;
use super::roster::RosterProvider;
use crate::config::AttendanceSettings;
use crate::db::{attendance, embeddings, lectures};
use crate::error::{conflict_on_unique, AttendanceError, AttendanceResult};
use crate::models::{
    Actor, AttendanceEntry, AttendancePhoto, AttendanceRecord, AttendanceStatus, ClassInfo,
    Lecture, LectureAttendanceSummary, LectureDetail, LectureStatus, Lifecycle, Role,
    StudentAttendanceRow, GENERATION_METHOD,
};

/// Outcome of a successful generation run
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSummary {
    pub lecture_id: Uuid,
    pub record_id: Uuid,
    pub present: usize,
    pub absent: usize,
    pub confidence: f64,
}

/// Lecture creation, photo intake and attendance generation
#[derive(Clone)]
pub struct LecturePipeline {
    db: SqlitePool,
    roster: Arc<dyn RosterProvider>,
    face: Arc<dyn FaceEmbeddingService>,
    settings: Arc<AttendanceSettings>,
    event_bus: EventBus,
    queue: GenerationQueue,
}

impl LecturePipeline {
    pub fn new(
        db: SqlitePool,
        roster: Arc<dyn RosterProvider>,
        face: Arc<dyn FaceEmbeddingService>,
        settings: Arc<AttendanceSettings>,
        event_bus: EventBus,
        queue: GenerationQueue,
    ) -> Self {
        Self {
            db,
            roster,
            face,
            settings,
            event_bus,
            queue,
        }
    }

    pub fn queue(&self) -> &GenerationQueue {
        &self.queue
    }

    async fn require_class(&self, class_id: Uuid) -> AttendanceResult<ClassInfo> {
        self.roster
            .class(class_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Class {}", class_id)))
    }

    async fn require_lecture(&self, lecture_id: Uuid) -> AttendanceResult<Lecture> {
        lectures::load_lecture(&self.db, lecture_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("Lecture {}", lecture_id)))
    }

    /// Class views are open to the owning faculty, HOD and ADMIN
    fn ensure_can_view_class(actor: &Actor, class: &ClassInfo) -> AttendanceResult<()> {
        match actor.role {
            Role::Admin | Role::Hod => Ok(()),
            Role::Faculty if class.is_owned_by(actor.user_id) => Ok(()),
            _ => Err(AttendanceError::Forbidden(format!(
                "Not allowed to view class {}",
                class.id
            ))),
        }
    }

    /// Schedule today's lecture for a timetable slot
    pub async fn create_lecture(
        &self,
        actor: &Actor,
        class_id: Uuid,
        slot_id: Uuid,
        now: DateTime<Utc>,
    ) -> AttendanceResult<Lecture> {
        let class = self.require_class(class_id).await?;
        if !class.is_owned_by(actor.user_id) {
            return Err(AttendanceError::Forbidden(
                "Only the class owner can create lectures".into(),
            ));
        }
        if !class.is_active() {
            return Err(AttendanceError::InvalidState(format!(
                "Class is {}, lectures require ACTIVE",
                class.status.as_str()
            )));
        }

        let slot = self
            .roster
            .slot(slot_id)
            .await?
            .filter(|s| s.class_id == class_id)
            .ok_or_else(|| {
                AttendanceError::NotFound(format!("Timetable slot {} for class {}", slot_id, class_id))
            })?;

        let today = time::campus_date(now, self.settings.campus_utc_offset_minutes)?;
        if slot.day_of_week != time::day_index(today) {
            return Err(AttendanceError::InvalidState(format!(
                "Slot is on day {} but today is day {}",
                slot.day_of_week,
                time::day_index(today)
            )));
        }

        let lecture = Lecture {
            id: uuid_utils::generate(),
            class_id,
            timetable_slot_id: slot_id,
            date: today,
            created_by: actor.user_id,
            status: LectureStatus::Created,
            created_at: now,
            updated_at: now,
        };

        lectures::insert_lecture(&self.db, &lecture)
            .await
            .map_err(|e| conflict_on_unique(e, "Lecture already exists for this slot today"))?;

        info!(
            lecture_id = %lecture.id,
            class_id = %class_id,
            date = %lecture.date,
            "Lecture created"
        );
        self.event_bus.emit_lossy(AttendanceEvent::LectureCreated {
            lecture_id: lecture.id,
            class_id,
            timestamp: now,
        });

        Ok(lecture)
    }

    /// Append photos and queue generation
    ///
    /// The first upload moves the lecture to PHOTO_UPLOADED. Generation is
    /// queued on every upload; the caller never waits for it.
    pub async fn upload_photos(
        &self,
        actor: &Actor,
        lecture_id: Uuid,
        storage_urls: Vec<String>,
        now: DateTime<Utc>,
    ) -> AttendanceResult<Lecture> {
        if storage_urls.is_empty() {
            return Err(AttendanceError::Validation("At least one photo is required".into()));
        }
        if storage_urls.iter().any(|u| u.trim().is_empty()) {
            return Err(AttendanceError::Validation("Photo location cannot be blank".into()));
        }

        let lecture = self.require_lecture(lecture_id).await?;
        if lecture.created_by != actor.user_id {
            return Err(AttendanceError::Forbidden(
                "Only the lecture creator can upload photos".into(),
            ));
        }
        if !matches!(lecture.status, LectureStatus::Created | LectureStatus::PhotoUploaded) {
            return Err(AttendanceError::InvalidState(format!(
                "Lecture is {}, photos can no longer be added",
                lecture.status.as_str()
            )));
        }
        self.check_upload_window(&lecture, now).await?;

        let photos: Vec<AttendancePhoto> = storage_urls
            .into_iter()
            .map(|url| AttendancePhoto {
                id: uuid_utils::generate(),
                lecture_id,
                storage_url: url.trim().to_string(),
                uploaded_by: actor.user_id,
                uploaded_at: now,
            })
            .collect();

        let mut tx = self.db.begin().await?;
        lectures::insert_photos(&mut tx, &photos).await?;
        if lecture.status == LectureStatus::Created {
            let next = lecture.status.transition(LectureStatus::PhotoUploaded)?;
            let moved =
                lectures::transition_status(&mut *tx, lecture_id, lecture.status, next, now).await?;
            if !moved {
                debug!(lecture_id = %lecture_id, "Lecture left CREATED concurrently");
            }
        }
        tx.commit().await?;

        info!(lecture_id = %lecture_id, photos = photos.len(), "Photos uploaded");
        self.event_bus.emit_lossy(AttendanceEvent::PhotosUploaded {
            lecture_id,
            photo_count: photos.len(),
            timestamp: now,
        });

        self.queue.enqueue(lecture_id).await;

        self.require_lecture(lecture_id).await
    }

    /// Reject uploads after slot end + `upload_window_minutes`, when configured
    async fn check_upload_window(&self, lecture: &Lecture, now: DateTime<Utc>) -> AttendanceResult<()> {
        let Some(minutes) = self.settings.upload_window_minutes else {
            return Ok(());
        };

        let Some(slot) = self.roster.slot(lecture.timetable_slot_id).await? else {
            warn!(
                lecture_id = %lecture.id,
                "Timetable slot no longer active, skipping upload window check"
            );
            return Ok(());
        };

        let slot_end = time::campus_instant(
            lecture.date,
            slot.end_time,
            self.settings.campus_utc_offset_minutes,
        )?;
        let deadline = Duration::try_minutes(minutes)
            .and_then(|window| slot_end.checked_add_signed(window))
            .ok_or_else(|| {
                AttendanceError::Common(rollcall_common::Error::Config(format!(
                    "Upload window of {} minutes is out of range",
                    minutes
                )))
            })?;
        if now > deadline {
            return Err(AttendanceError::WindowExpired(format!(
                "Photo upload closed at {}",
                deadline.to_rfc3339()
            )));
        }
        Ok(())
    }

    /// Turn stored photos into a locked attendance record
    ///
    /// Fails with `Conflict` if the lecture already has attendance, without
    /// touching any data. Face service failures surface as
    /// `UpstreamUnavailable` and leave the lecture in PHOTO_UPLOADED.
    pub async fn generate_attendance(
        &self,
        lecture_id: Uuid,
        now: DateTime<Utc>,
    ) -> AttendanceResult<GenerationSummary> {
        let lecture = self.require_lecture(lecture_id).await?;
        if lecture.status.has_attendance() {
            return Err(AttendanceError::Conflict(format!(
                "Attendance already generated for lecture {}",
                lecture_id
            )));
        }
        if lecture.status != LectureStatus::PhotoUploaded {
            return Err(AttendanceError::InvalidState(format!(
                "Lecture is {}, generation requires PHOTO_UPLOADED",
                lecture.status.as_str()
            )));
        }

        let photos = lectures::list_photos(&self.db, lecture_id).await?;
        if photos.is_empty() {
            return Err(AttendanceError::InvalidState("Lecture has no photos".into()));
        }

        let roster = self.roster.approved_students(lecture.class_id).await?;
        let stored = embeddings::load_embeddings(&self.db, &roster).await?;

        let detected = if stored.is_empty() {
            debug!(lecture_id = %lecture_id, "No enrolled faces on roster, skipping detection");
            Vec::new()
        } else {
            let paths: Vec<PathBuf> = photos.iter().map(|p| PathBuf::from(&p.storage_url)).collect();
            self.face.detect_faces(&paths).await?
        };

        let matches = FaceMatcher::new(self.settings.match_threshold).classify(&roster, &stored, &detected);

        let record = AttendanceRecord {
            id: uuid_utils::generate(),
            lecture_id,
            class_id: lecture.class_id,
            generated_at: now,
            generation_method: GENERATION_METHOD.to_string(),
            confidence_score: aggregate_confidence(&matches),
        };
        let entries: Vec<AttendanceEntry> = matches
            .iter()
            .map(|m| AttendanceEntry {
                id: uuid_utils::generate(),
                record_id: record.id,
                lecture_id,
                class_id: lecture.class_id,
                student_id: m.student_id,
                status: m.status,
                confidence_score: m.confidence,
                created_at: now,
            })
            .collect();

        let generated = lecture.status.transition(LectureStatus::AttendanceGenerated)?;
        let locked = generated.transition(LectureStatus::Locked)?;

        let mut tx = self.db.begin().await?;
        attendance::insert_record(&mut *tx, &record)
            .await
            .map_err(|e| conflict_on_unique(e, format!("Attendance already generated for lecture {}", lecture_id)))?;
        attendance::insert_entries(&mut tx, &entries).await?;
        let moved = lectures::transition_status(&mut *tx, lecture_id, lecture.status, generated, now).await?
            && lectures::transition_status(&mut *tx, lecture_id, generated, locked, now).await?;
        if !moved {
            // Dropping the transaction rolls back the record and entries
            return Err(AttendanceError::InvalidState(format!(
                "Lecture {} changed state during generation",
                lecture_id
            )));
        }
        tx.commit().await?;

        let present = entries
            .iter()
            .filter(|e| e.status == AttendanceStatus::Present)
            .count();
        let summary = GenerationSummary {
            lecture_id,
            record_id: record.id,
            present,
            absent: entries.len() - present,
            confidence: record.confidence_score,
        };

        info!(
            lecture_id = %lecture_id,
            record_id = %record.id,
            present = summary.present,
            absent = summary.absent,
            detected_faces = detected.len(),
            "Attendance generated and locked"
        );
        self.event_bus.emit_lossy(AttendanceEvent::AttendanceLocked {
            lecture_id,
            record_id: record.id,
            present_count: summary.present,
            absent_count: summary.absent,
            timestamp: now,
        });

        Ok(summary)
    }

    /// Present/absent counts for every LOCKED lecture of a class
    pub async fn class_attendance(
        &self,
        actor: &Actor,
        class_id: Uuid,
    ) -> AttendanceResult<Vec<LectureAttendanceSummary>> {
        let class = self.require_class(class_id).await?;
        Self::ensure_can_view_class(actor, &class)?;
        Ok(attendance::class_summaries(&self.db, class_id).await?)
    }

    /// The calling student's entries, most recent first
    pub async fn student_attendance(&self, actor: &Actor) -> AttendanceResult<Vec<StudentAttendanceRow>> {
        require_role(actor, &[Role::Student], "view own attendance")?;

        let rows = attendance::entries_for_student(&self.db, actor.user_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| StudentAttendanceRow {
                entry_id: row.entry.id,
                lecture_id: row.entry.lecture_id,
                class_id: row.entry.class_id,
                date: row.date,
                status: row.entry.status,
                confidence_score: row.entry.confidence_score,
            })
            .collect())
    }

    /// Lectures dated today: own classes for faculty, all for ADMIN/HOD
    pub async fn todays_lectures(&self, actor: &Actor, now: DateTime<Utc>) -> AttendanceResult<Vec<Lecture>> {
        let faculty_filter = match actor.role {
            Role::Faculty => Some(actor.user_id),
            Role::Admin | Role::Hod => None,
            Role::Student => {
                return Err(AttendanceError::Forbidden(
                    "Students cannot list lectures".into(),
                ))
            }
        };
        let today = time::campus_date(now, self.settings.campus_utc_offset_minutes)?;
        Ok(lectures::lectures_on_date(&self.db, today, faculty_filter).await?)
    }

    /// Lecture with its photos
    pub async fn lecture_detail(&self, actor: &Actor, lecture_id: Uuid) -> AttendanceResult<LectureDetail> {
        let lecture = self.require_lecture(lecture_id).await?;
        let class = self.require_class(lecture.class_id).await?;
        Self::ensure_can_view_class(actor, &class)?;

        let photos = lectures::list_photos(&self.db, lecture_id).await?;
        Ok(LectureDetail { lecture, photos })
    }

    /// Lectures that have photos but no attendance yet
    pub async fn pending_generation(&self) -> AttendanceResult<Vec<Uuid>> {
        Ok(lectures::lecture_ids_with_status(&self.db, LectureStatus::PhotoUploaded).await?)
    }
}
