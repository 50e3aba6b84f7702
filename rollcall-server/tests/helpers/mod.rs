//! Test helper utilities
//!
//! Shared fixtures for rollcall-server integration tests: an in-memory
//! database seeded with one class, a scripted face service and service
//! wiring without the background worker.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use rollcall_common::events::EventBus;
use rollcall_common::time;
use rollcall_server::config::AttendanceSettings;
use rollcall_server::db::{embeddings, registry};
use rollcall_server::models::{
    Actor, ClassInfo, ClassStatus, Embedding, EnrollmentStatus, Role, TimetableSlot, EMBEDDING_DIM,
};
use rollcall_server::services::{
    AuditLedger, DisputeWorkflow, FaceEmbeddingService, FaceServiceError, GenerationQueue,
    GenerationReceiver, LecturePipeline, OverrideReconciler, RosterProvider, SqliteRoster,
    StudentEmbedding,
};
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Monday 2026-10-19 10:00 UTC
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
}

pub async fn create_test_db() -> SqlitePool {
    rollcall_common::db::init_memory_database()
        .await
        .expect("in-memory database")
}

/// Unit vector along `axis`
pub fn unit_embedding(axis: usize) -> Embedding {
    let mut values = vec![0.0f32; EMBEDDING_DIM];
    values[axis % EMBEDDING_DIM] = 1.0;
    Embedding::new(values).unwrap()
}

/// Unit vector whose cosine similarity to `unit_embedding(axis)` is `similarity`
pub fn embedding_with_similarity(axis: usize, similarity: f64) -> Embedding {
    let mut values = vec![0.0f32; EMBEDDING_DIM];
    values[axis % EMBEDDING_DIM] = similarity as f32;
    values[(axis + EMBEDDING_DIM / 2) % EMBEDDING_DIM] = (1.0 - similarity * similarity).sqrt() as f32;
    Embedding::new(values).unwrap()
}

/// Scripted stand-in for the face embedding service
///
/// `detect_faces` pops scripted outcomes in order and falls back to
/// `default_faces` once the script is empty.
#[derive(Default)]
pub struct StubFaceService {
    detect_script: Mutex<VecDeque<Result<Vec<Embedding>, FaceServiceError>>>,
    default_faces: Mutex<Vec<Embedding>>,
    embed_failure: Mutex<Option<FaceServiceError>>,
    detect_calls: AtomicUsize,
    embed_calls: AtomicUsize,
}

impl StubFaceService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every detection call returns these faces
    pub fn with_faces(faces: Vec<Embedding>) -> Arc<Self> {
        let stub = Self::default();
        *stub.default_faces.lock().unwrap() = faces;
        Arc::new(stub)
    }

    pub fn push_detection(&self, outcome: Result<Vec<Embedding>, FaceServiceError>) {
        self.detect_script.lock().unwrap().push_back(outcome);
    }

    pub fn push_unavailable(&self, times: usize) {
        for _ in 0..times {
            self.push_detection(Err(FaceServiceError::Unavailable("connection refused".into())));
        }
    }

    pub fn fail_next_embed(&self, err: FaceServiceError) {
        *self.embed_failure.lock().unwrap() = Some(err);
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceEmbeddingService for StubFaceService {
    async fn embed(&self, _student_id: Uuid, images: &[PathBuf]) -> Result<StudentEmbedding, FaceServiceError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.embed_failure.lock().unwrap().take() {
            return Err(err);
        }
        Ok(StudentEmbedding {
            embedding: unit_embedding(7),
            images_used: images.len(),
        })
    }

    async fn detect_faces(&self, _images: &[PathBuf]) -> Result<Vec<Embedding>, FaceServiceError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(outcome) = self.detect_script.lock().unwrap().pop_front() {
            return outcome;
        }
        Ok(self.default_faces.lock().unwrap().clone())
    }
}

/// One active class with a slot on `now`'s weekday and enrolled students
pub struct Campus {
    pub db: SqlitePool,
    pub department_id: Uuid,
    pub faculty_id: Uuid,
    pub class_id: Uuid,
    pub slot_id: Uuid,
    /// Student `i` has reference embedding `unit_embedding(i)`
    pub students: Vec<Uuid>,
}

impl Campus {
    pub fn faculty(&self) -> Actor {
        Actor::new(self.faculty_id, Role::Faculty)
    }

    pub fn student(&self, i: usize) -> Actor {
        Actor::new(self.students[i], Role::Student)
    }

    pub fn admin(&self) -> Actor {
        Actor::new(Uuid::new_v4(), Role::Admin)
    }

    pub fn hod(&self) -> Actor {
        Actor::new(Uuid::new_v4(), Role::Hod).with_department(self.department_id)
    }
}

pub async fn seed_campus(db: &SqlitePool, student_count: usize, now: DateTime<Utc>) -> Campus {
    let department_id = Uuid::new_v4();
    let faculty_id = Uuid::new_v4();
    let class_id = Uuid::new_v4();
    let slot_id = Uuid::new_v4();

    registry::insert_class(
        db,
        &ClassInfo {
            id: class_id,
            title: "Operating Systems".into(),
            faculty_id,
            department_id: Some(department_id),
            status: ClassStatus::Active,
        },
    )
    .await
    .unwrap();

    registry::insert_slot(
        db,
        &TimetableSlot {
            id: slot_id,
            class_id,
            day_of_week: time::day_index(now.date_naive()),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        },
    )
    .await
    .unwrap();

    let mut students = Vec::with_capacity(student_count);
    for i in 0..student_count {
        let student_id = Uuid::new_v4();
        registry::insert_enrollment(db, student_id, class_id, EnrollmentStatus::Approved)
            .await
            .unwrap();
        embeddings::upsert_embedding(db, student_id, &unit_embedding(i), now)
            .await
            .unwrap();
        students.push(student_id);
    }

    Campus {
        db: db.clone(),
        department_id,
        faculty_id,
        class_id,
        slot_id,
        students,
    }
}

/// Services wired over one database, without a running generation worker
///
/// The queue receiver is held so enqueueing succeeds; jobs are never run.
pub struct Services {
    pub pipeline: LecturePipeline,
    pub disputes: DisputeWorkflow,
    pub overrides: OverrideReconciler,
    pub audit: AuditLedger,
    pub event_bus: EventBus,
    pub receiver: GenerationReceiver,
}

pub fn build_services(db: &SqlitePool, face: Arc<StubFaceService>, settings: AttendanceSettings) -> Services {
    let settings = Arc::new(settings);
    let event_bus = EventBus::new(100);
    let roster: Arc<dyn RosterProvider> = Arc::new(SqliteRoster::new(db.clone()));
    let (queue, receiver) = GenerationQueue::new();

    Services {
        pipeline: LecturePipeline::new(
            db.clone(),
            roster.clone(),
            face,
            settings.clone(),
            event_bus.clone(),
            queue,
        ),
        disputes: DisputeWorkflow::new(db.clone(), roster, settings, event_bus.clone()),
        overrides: OverrideReconciler::new(db.clone(), event_bus.clone()),
        audit: AuditLedger::new(db.clone()),
        event_bus,
        receiver,
    }
}

/// Create a lecture, upload one photo and generate attendance at `now`
///
/// Returns the lecture id.
pub async fn locked_lecture(services: &Services, campus: &Campus, now: DateTime<Utc>) -> Uuid {
    let lecture = services
        .pipeline
        .create_lecture(&campus.faculty(), campus.class_id, campus.slot_id, now)
        .await
        .unwrap();
    services
        .pipeline
        .upload_photos(&campus.faculty(), lecture.id, vec!["photos/class-1.jpg".into()], now)
        .await
        .unwrap();
    services.pipeline.generate_attendance(lecture.id, now).await.unwrap();
    lecture.id
}

/// Settings with fast retries for queue tests
pub fn fast_retry_settings(max_attempts: u32) -> AttendanceSettings {
    AttendanceSettings {
        generation_max_attempts: max_attempts,
        generation_backoff_ms: 10,
        ..Default::default()
    }
}

/// Poll `check` until it returns true or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
