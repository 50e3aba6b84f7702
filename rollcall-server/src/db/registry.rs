//! Registry collaborator tables (classes, timetable slots, enrollments)
//!
//! The attendance core reads these through `RosterProvider`. The insert
//! helpers exist for seeding and tests; class management owns the real writes.

use chrono::Utc;
use rollcall_common::{time, uuid_utils, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{get_opt_uuid, get_uuid};
use crate::models::lifecycle::parse_stored;
use crate::models::{ClassInfo, EnrollmentStatus, Lifecycle, TimetableSlot};

const SLOT_TIME_FORMAT: &str = "%H:%M";

fn row_to_class(row: &SqliteRow) -> Result<ClassInfo> {
    let status: String = row.try_get("status")?;
    Ok(ClassInfo {
        id: get_uuid(row, "id")?,
        title: row.try_get("title")?,
        faculty_id: get_uuid(row, "faculty_id")?,
        department_id: get_opt_uuid(row, "department_id")?,
        status: parse_stored(&status)?,
    })
}

fn row_to_slot(row: &SqliteRow) -> Result<TimetableSlot> {
    let day: i64 = row.try_get("day_of_week")?;
    let start: String = row.try_get("start_time")?;
    let end: String = row.try_get("end_time")?;
    Ok(TimetableSlot {
        id: get_uuid(row, "id")?,
        class_id: get_uuid(row, "class_id")?,
        day_of_week: u8::try_from(day).map_err(|_| {
            rollcall_common::Error::Internal(format!("Corrupt day_of_week {}", day))
        })?,
        start_time: time::parse_slot_time(&start)?,
        end_time: time::parse_slot_time(&end)?,
    })
}

pub async fn load_class(pool: &SqlitePool, class_id: Uuid) -> Result<Option<ClassInfo>> {
    let row = sqlx::query(
        "SELECT id, title, faculty_id, department_id, status FROM classes WHERE id = ?",
    )
    .bind(class_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_class).transpose()
}

/// Active slot by id; deactivated slots are treated as missing
pub async fn load_slot(pool: &SqlitePool, slot_id: Uuid) -> Result<Option<TimetableSlot>> {
    let row = sqlx::query(
        r#"
        SELECT id, class_id, day_of_week, start_time, end_time
        FROM timetable_slots
        WHERE id = ? AND is_active = 1
        "#,
    )
    .bind(slot_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_slot).transpose()
}

/// APPROVED students of a class, in enrollment order
pub async fn approved_students(pool: &SqlitePool, class_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        r#"
        SELECT student_id FROM enrollments
        WHERE class_id = ? AND status = ?
        ORDER BY requested_at, student_id
        "#,
    )
    .bind(class_id.to_string())
    .bind(EnrollmentStatus::Approved.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(|r| get_uuid(r, "student_id")).collect()
}

pub async fn insert_class(pool: &SqlitePool, class: &ClassInfo) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO classes (id, title, faculty_id, department_id, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(class.id.to_string())
    .bind(&class.title)
    .bind(class.faculty_id.to_string())
    .bind(class.department_id.map(|d| d.to_string()))
    .bind(class.status.as_str())
    .bind(time::format_timestamp(Utc::now()))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_slot(pool: &SqlitePool, slot: &TimetableSlot) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO timetable_slots (id, class_id, day_of_week, start_time, end_time, is_active)
        VALUES (?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(slot.id.to_string())
    .bind(slot.class_id.to_string())
    .bind(i64::from(slot.day_of_week))
    .bind(slot.start_time.format(SLOT_TIME_FORMAT).to_string())
    .bind(slot.end_time.format(SLOT_TIME_FORMAT).to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_enrollment(
    pool: &SqlitePool,
    student_id: Uuid,
    class_id: Uuid,
    status: EnrollmentStatus,
) -> Result<()> {
    let now = time::format_timestamp(Utc::now());
    let approved_at = (status == EnrollmentStatus::Approved).then(|| now.clone());

    sqlx::query(
        r#"
        INSERT INTO enrollments (id, student_id, class_id, status, requested_at, approved_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(uuid_utils::generate().to_string())
    .bind(student_id.to_string())
    .bind(class_id.to_string())
    .bind(status.as_str())
    .bind(&now)
    .bind(approved_at)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassStatus;
    use chrono::NaiveTime;
    use rollcall_common::db::init_memory_database;

    #[tokio::test]
    async fn test_roster_only_lists_approved() {
        let pool = init_memory_database().await.unwrap();
        let class = ClassInfo {
            id: Uuid::new_v4(),
            title: "Compilers".into(),
            faculty_id: Uuid::new_v4(),
            department_id: None,
            status: ClassStatus::Active,
        };
        insert_class(&pool, &class).await.unwrap();

        let approved = Uuid::new_v4();
        insert_enrollment(&pool, approved, class.id, EnrollmentStatus::Approved).await.unwrap();
        insert_enrollment(&pool, Uuid::new_v4(), class.id, EnrollmentStatus::Requested).await.unwrap();
        insert_enrollment(&pool, Uuid::new_v4(), class.id, EnrollmentStatus::Suspended).await.unwrap();

        assert_eq!(approved_students(&pool, class.id).await.unwrap(), vec![approved]);
    }

    #[tokio::test]
    async fn test_slot_round_trip() {
        let pool = init_memory_database().await.unwrap();
        let class = ClassInfo {
            id: Uuid::new_v4(),
            title: "Networks".into(),
            faculty_id: Uuid::new_v4(),
            department_id: Some(Uuid::new_v4()),
            status: ClassStatus::Active,
        };
        insert_class(&pool, &class).await.unwrap();
        let slot = TimetableSlot {
            id: Uuid::new_v4(),
            class_id: class.id,
            day_of_week: 1,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        };
        insert_slot(&pool, &slot).await.unwrap();

        let loaded = load_slot(&pool, slot.id).await.unwrap().unwrap();
        assert_eq!(loaded.day_of_week, 1);
        assert_eq!(loaded.end_time, slot.end_time);
        assert_eq!(load_class(&pool, class.id).await.unwrap().unwrap().department_id, class.department_id);
    }
}
