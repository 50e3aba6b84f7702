//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates every table the
//! attendance service needs. All statements are idempotent, so this runs on
//! every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open the database file, creating it and its tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets attendance generation write while views read
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Limited to a single connection: every SQLite in-memory connection is its
/// own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_settings_table(pool).await?;

    // Registry collaborator tables (owned by class/enrollment management)
    create_classes_table(pool).await?;
    create_timetable_slots_table(pool).await?;
    create_enrollments_table(pool).await?;

    // Attendance lifecycle
    create_lectures_table(pool).await?;
    create_attendance_photos_table(pool).await?;
    create_attendance_records_table(pool).await?;
    create_attendance_entries_table(pool).await?;

    // Corrections and audit
    create_attendance_disputes_table(pool).await?;
    create_attendance_overrides_table(pool).await?;
    create_audit_logs_table(pool).await?;

    create_student_embeddings_table(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_classes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classes (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            faculty_id TEXT NOT NULL,
            department_id TEXT,
            status TEXT NOT NULL DEFAULT 'DRAFT'
                CHECK (status IN ('DRAFT', 'PENDING_HOD_APPROVAL', 'ACTIVE', 'REJECTED', 'ARCHIVED')),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_classes_faculty ON classes(faculty_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_timetable_slots_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS timetable_slots (
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL REFERENCES classes(id),
            day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_timetable_class_day ON timetable_slots(class_id, day_of_week)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_enrollments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrollments (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            class_id TEXT NOT NULL REFERENCES classes(id),
            status TEXT NOT NULL DEFAULT 'REQUESTED'
                CHECK (status IN ('REQUESTED', 'APPROVED', 'REJECTED', 'SUSPENDED')),
            requested_at TEXT NOT NULL,
            approved_at TEXT,
            UNIQUE (student_id, class_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_enrollments_class ON enrollments(class_id, status)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_lectures_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lectures (
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL REFERENCES classes(id),
            timetable_slot_id TEXT NOT NULL REFERENCES timetable_slots(id),
            date TEXT NOT NULL,
            created_by TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'CREATED'
                CHECK (status IN ('CREATED', 'PHOTO_UPLOADED', 'ATTENDANCE_GENERATED', 'LOCKED')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (class_id, timetable_slot_id, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lectures_status ON lectures(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lectures_date ON lectures(date)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_attendance_photos_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_photos (
            id TEXT PRIMARY KEY,
            lecture_id TEXT NOT NULL REFERENCES lectures(id),
            storage_url TEXT NOT NULL,
            uploaded_by TEXT NOT NULL,
            uploaded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_photos_lecture ON attendance_photos(lecture_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_attendance_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_records (
            id TEXT PRIMARY KEY,
            lecture_id TEXT NOT NULL UNIQUE REFERENCES lectures(id),
            class_id TEXT NOT NULL,
            generated_at TEXT NOT NULL,
            generation_method TEXT NOT NULL,
            confidence_score REAL NOT NULL CHECK (confidence_score BETWEEN 0 AND 1)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_class ON attendance_records(class_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_attendance_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_entries (
            id TEXT PRIMARY KEY,
            record_id TEXT NOT NULL REFERENCES attendance_records(id),
            lecture_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('PRESENT', 'ABSENT')),
            confidence_score REAL NOT NULL CHECK (confidence_score BETWEEN 0 AND 1),
            created_at TEXT NOT NULL,
            UNIQUE (record_id, student_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_student ON attendance_entries(student_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_attendance_disputes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_disputes (
            id TEXT PRIMARY KEY,
            entry_id TEXT NOT NULL REFERENCES attendance_entries(id),
            student_id TEXT NOT NULL,
            lecture_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            reason TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'OPEN'
                CHECK (status IN ('OPEN', 'FACULTY_APPROVED', 'FACULTY_REJECTED', 'ADMIN_OVERRIDDEN')),
            resolved_by TEXT,
            resolved_at TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (entry_id, student_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_disputes_class ON attendance_disputes(class_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_disputes_student ON attendance_disputes(student_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_attendance_overrides_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_overrides (
            id TEXT PRIMARY KEY,
            entry_id TEXT NOT NULL UNIQUE REFERENCES attendance_entries(id),
            dispute_id TEXT,
            previous_status TEXT NOT NULL CHECK (previous_status IN ('PRESENT', 'ABSENT')),
            new_status TEXT NOT NULL CHECK (new_status IN ('PRESENT', 'ABSENT')),
            reason TEXT NOT NULL,
            approved_by TEXT NOT NULL,
            approved_by_role TEXT NOT NULL CHECK (approved_by_role IN ('FACULTY', 'ADMIN', 'HOD')),
            approved_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Audit rows are only ever inserted; `seq` gives a total chronological order
async fn create_audit_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            action TEXT NOT NULL CHECK (action IN ('DISPUTE_RAISED', 'DISPUTE_RESULT', 'ADMIN_OVERRIDE')),
            performed_by TEXT NOT NULL,
            performed_by_role TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            payload TEXT NOT NULL DEFAULT '{}',
            timestamp TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_logs(entity_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_actor ON audit_logs(performed_by)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_student_embeddings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS student_embeddings (
            student_id TEXT PRIMARY KEY,
            embedding TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
