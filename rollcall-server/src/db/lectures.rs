//! Lecture and attendance photo persistence

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::{get_timestamp, get_uuid};
use crate::models::lifecycle::parse_stored;
use crate::models::{AttendancePhoto, Lecture, LectureStatus, Lifecycle};

const LECTURE_COLUMNS: &str =
    "l.id, l.class_id, l.timetable_slot_id, l.date, l.created_by, l.status, l.created_at, l.updated_at";

fn row_to_lecture(row: &SqliteRow) -> Result<Lecture> {
    let date: String = row.try_get("date")?;
    let status: String = row.try_get("status")?;
    Ok(Lecture {
        id: get_uuid(row, "id")?,
        class_id: get_uuid(row, "class_id")?,
        timetable_slot_id: get_uuid(row, "timetable_slot_id")?,
        date: time::parse_date(&date)?,
        created_by: get_uuid(row, "created_by")?,
        status: parse_stored(&status)?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

fn row_to_photo(row: &SqliteRow) -> Result<AttendancePhoto> {
    Ok(AttendancePhoto {
        id: get_uuid(row, "id")?,
        lecture_id: get_uuid(row, "lecture_id")?,
        storage_url: row.try_get("storage_url")?,
        uploaded_by: get_uuid(row, "uploaded_by")?,
        uploaded_at: get_timestamp(row, "uploaded_at")?,
    })
}

/// Insert a new lecture
///
/// Fails with a unique violation when (class, slot, date) already exists.
pub async fn insert_lecture(pool: &SqlitePool, lecture: &Lecture) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO lectures (id, class_id, timetable_slot_id, date, created_by, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(lecture.id.to_string())
    .bind(lecture.class_id.to_string())
    .bind(lecture.timetable_slot_id.to_string())
    .bind(time::format_date(lecture.date))
    .bind(lecture.created_by.to_string())
    .bind(lecture.status.as_str())
    .bind(time::format_timestamp(lecture.created_at))
    .bind(time::format_timestamp(lecture.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_lecture<'e, E>(executor: E, lecture_id: Uuid) -> Result<Option<Lecture>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM lectures l WHERE l.id = ?", LECTURE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(lecture_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(row_to_lecture).transpose()
}

/// Move a lecture from `from` to `to`
///
/// Guarded on the current status; returns `false` when the lecture was not in
/// `from` (another writer got there first).
pub async fn transition_status<'e, E>(
    executor: E,
    lecture_id: Uuid,
    from: LectureStatus,
    to: LectureStatus,
    now: DateTime<Utc>,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE lectures SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(time::format_timestamp(now))
        .bind(lecture_id.to_string())
        .bind(from.as_str())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Append photos; existing photos are never touched
pub async fn insert_photos(conn: &mut SqliteConnection, photos: &[AttendancePhoto]) -> Result<()> {
    for photo in photos {
        sqlx::query(
            r#"
            INSERT INTO attendance_photos (id, lecture_id, storage_url, uploaded_by, uploaded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(photo.id.to_string())
        .bind(photo.lecture_id.to_string())
        .bind(&photo.storage_url)
        .bind(photo.uploaded_by.to_string())
        .bind(time::format_timestamp(photo.uploaded_at))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Photos of a lecture in upload order
pub async fn list_photos(pool: &SqlitePool, lecture_id: Uuid) -> Result<Vec<AttendancePhoto>> {
    let rows = sqlx::query(
        r#"
        SELECT id, lecture_id, storage_url, uploaded_by, uploaded_at
        FROM attendance_photos
        WHERE lecture_id = ?
        ORDER BY uploaded_at, rowid
        "#,
    )
    .bind(lecture_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_photo).collect()
}

/// Lectures on `date`, optionally limited to classes taught by `faculty_id`
pub async fn lectures_on_date(
    pool: &SqlitePool,
    date: NaiveDate,
    faculty_id: Option<Uuid>,
) -> Result<Vec<Lecture>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM lectures l
        JOIN classes c ON c.id = l.class_id
        WHERE l.date = ?1 AND (?2 IS NULL OR c.faculty_id = ?2)
        ORDER BY l.created_at
        "#,
        LECTURE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(time::format_date(date))
        .bind(faculty_id.map(|f| f.to_string()))
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_lecture).collect()
}

/// Ids of lectures currently in `status`, oldest first
pub async fn lecture_ids_with_status(pool: &SqlitePool, status: LectureStatus) -> Result<Vec<Uuid>> {
    let rows = sqlx::query("SELECT id FROM lectures WHERE status = ? ORDER BY updated_at")
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;

    rows.iter().map(|r| get_uuid(r, "id")).collect()
}
