//! Attendance records and entries
//!
//! Both tables are insert-only. Generation writes one record and all of its
//! entries inside the caller's transaction.

use rollcall_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::overrides::row_to_override_prefixed;
use super::{get_timestamp, get_uuid};
use crate::models::{
    AttendanceEntry, AttendanceOverride, AttendanceRecord, AttendanceStatus,
    LectureAttendanceSummary,
};

const ENTRY_COLUMNS: &str =
    "e.id, e.record_id, e.lecture_id, e.class_id, e.student_id, e.status, e.confidence_score, e.created_at";

/// Entry joined with its lecture date and current override
#[derive(Debug, Clone)]
pub struct EntryWithOverride {
    pub entry: AttendanceEntry,
    pub date: chrono::NaiveDate,
    pub override_row: Option<AttendanceOverride>,
}

fn row_to_record(row: &SqliteRow) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: get_uuid(row, "id")?,
        lecture_id: get_uuid(row, "lecture_id")?,
        class_id: get_uuid(row, "class_id")?,
        generated_at: get_timestamp(row, "generated_at")?,
        generation_method: row.try_get("generation_method")?,
        confidence_score: row.try_get("confidence_score")?,
    })
}

pub(crate) fn row_to_entry(row: &SqliteRow) -> Result<AttendanceEntry> {
    let status: String = row.try_get("status")?;
    Ok(AttendanceEntry {
        id: get_uuid(row, "id")?,
        record_id: get_uuid(row, "record_id")?,
        lecture_id: get_uuid(row, "lecture_id")?,
        class_id: get_uuid(row, "class_id")?,
        student_id: get_uuid(row, "student_id")?,
        status: AttendanceStatus::parse_stored(&status)?,
        confidence_score: row.try_get("confidence_score")?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

/// Insert the record for a lecture
///
/// A second record for the same lecture fails with a unique violation.
pub async fn insert_record<'e, E>(executor: E, record: &AttendanceRecord) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO attendance_records (id, lecture_id, class_id, generated_at, generation_method, confidence_score)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.lecture_id.to_string())
    .bind(record.class_id.to_string())
    .bind(time::format_timestamp(record.generated_at))
    .bind(&record.generation_method)
    .bind(record.confidence_score)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn insert_entries(conn: &mut SqliteConnection, entries: &[AttendanceEntry]) -> Result<()> {
    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO attendance_entries
                (id, record_id, lecture_id, class_id, student_id, status, confidence_score, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.record_id.to_string())
        .bind(entry.lecture_id.to_string())
        .bind(entry.class_id.to_string())
        .bind(entry.student_id.to_string())
        .bind(entry.status.as_str())
        .bind(entry.confidence_score)
        .bind(time::format_timestamp(entry.created_at))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn load_record_for_lecture<'e, E>(executor: E, lecture_id: Uuid) -> Result<Option<AttendanceRecord>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        SELECT id, lecture_id, class_id, generated_at, generation_method, confidence_score
        FROM attendance_records
        WHERE lecture_id = ?
        "#,
    )
    .bind(lecture_id.to_string())
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(row_to_record).transpose()
}

pub async fn load_entry<'e, E>(executor: E, entry_id: Uuid) -> Result<Option<AttendanceEntry>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM attendance_entries e WHERE e.id = ?", ENTRY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(entry_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(row_to_entry).transpose()
}

pub async fn entries_for_lecture(pool: &SqlitePool, lecture_id: Uuid) -> Result<Vec<AttendanceEntry>> {
    let sql = format!(
        "SELECT {} FROM attendance_entries e WHERE e.lecture_id = ? ORDER BY e.rowid",
        ENTRY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(lecture_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_entry).collect()
}

/// Per-lecture counts for every LOCKED lecture of a class, newest first
pub async fn class_summaries(pool: &SqlitePool, class_id: Uuid) -> Result<Vec<LectureAttendanceSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT l.id AS lecture_id, l.date AS date, r.id AS record_id, r.confidence_score AS confidence_score,
            COALESCE(SUM(CASE WHEN e.status = 'PRESENT' THEN 1 ELSE 0 END), 0) AS present,
            COALESCE(SUM(CASE WHEN e.status = 'ABSENT' THEN 1 ELSE 0 END), 0) AS absent,
            COALESCE(SUM(CASE WHEN COALESCE(o.new_status, e.status) = 'PRESENT' THEN 1 ELSE 0 END), 0)
                AS effective_present,
            COALESCE(SUM(CASE WHEN COALESCE(o.new_status, e.status) = 'ABSENT' THEN 1 ELSE 0 END), 0)
                AS effective_absent
        FROM lectures l
        JOIN attendance_records r ON r.lecture_id = l.id
        LEFT JOIN attendance_entries e ON e.record_id = r.id
        LEFT JOIN attendance_overrides o ON o.entry_id = e.id
        WHERE l.class_id = ? AND l.status = 'LOCKED'
        GROUP BY l.id, l.date, r.id, r.confidence_score
        ORDER BY l.date DESC, MAX(l.created_at) DESC
        "#,
    )
    .bind(class_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let date: String = row.try_get("date")?;
            Ok(LectureAttendanceSummary {
                lecture_id: get_uuid(row, "lecture_id")?,
                date: time::parse_date(&date)?,
                record_id: get_uuid(row, "record_id")?,
                confidence_score: row.try_get("confidence_score")?,
                present: row.try_get("present")?,
                absent: row.try_get("absent")?,
                effective_present: row.try_get("effective_present")?,
                effective_absent: row.try_get("effective_absent")?,
            })
        })
        .collect()
}

/// Every entry of a student with its override, most recent lecture first
pub async fn entries_for_student(pool: &SqlitePool, student_id: Uuid) -> Result<Vec<EntryWithOverride>> {
    let sql = format!(
        r#"
        SELECT {}, l.date AS date,
            o.id AS o_id, o.entry_id AS o_entry_id, o.dispute_id AS o_dispute_id,
            o.previous_status AS o_previous_status, o.new_status AS o_new_status,
            o.reason AS o_reason, o.approved_by AS o_approved_by,
            o.approved_by_role AS o_approved_by_role, o.approved_at AS o_approved_at
        FROM attendance_entries e
        JOIN lectures l ON l.id = e.lecture_id
        LEFT JOIN attendance_overrides o ON o.entry_id = e.id
        WHERE e.student_id = ?
        ORDER BY l.date DESC, e.created_at DESC
        "#,
        ENTRY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(student_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            let date: String = row.try_get("date")?;
            let override_id: Option<String> = row.try_get("o_id")?;
            let override_row = match override_id {
                Some(_) => Some(row_to_override_prefixed(row, "o_")?),
                None => None,
            };
            Ok(EntryWithOverride {
                entry: row_to_entry(row)?,
                date: time::parse_date(&date)?,
                override_row,
            })
        })
        .collect()
}
