//! Attendance override persistence
//!
//! One row per entry. Corrections update the row in place, shifting the
//! existing `new_status` into `previous_status` in the same statement.

use chrono::{DateTime, Utc};
use rollcall_common::{time, uuid_utils, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::{get_opt_uuid, get_timestamp, get_uuid};
use crate::models::{AttendanceOverride, AttendanceStatus, OverrideHistoryItem, Role};

const OVERRIDE_COLUMNS: &str =
    "id, entry_id, dispute_id, previous_status, new_status, reason, approved_by, approved_by_role, approved_at";

/// Correction to apply to an entry
#[derive(Debug, Clone)]
pub struct OverrideChange {
    pub entry_id: Uuid,
    pub dispute_id: Option<Uuid>,
    /// Status of the entry itself; used only when no override exists yet
    pub entry_status: AttendanceStatus,
    pub new_status: AttendanceStatus,
    pub reason: String,
    pub approved_by: Uuid,
    pub approved_by_role: Role,
    pub approved_at: DateTime<Utc>,
}

pub(crate) fn row_to_override_prefixed(row: &SqliteRow, prefix: &str) -> Result<AttendanceOverride> {
    let col = |name: &str| format!("{}{}", prefix, name);
    let previous: String = row.try_get(col("previous_status").as_str())?;
    let new: String = row.try_get(col("new_status").as_str())?;
    let role: String = row.try_get(col("approved_by_role").as_str())?;

    Ok(AttendanceOverride {
        id: get_uuid(row, &col("id"))?,
        entry_id: get_uuid(row, &col("entry_id"))?,
        dispute_id: get_opt_uuid(row, &col("dispute_id"))?,
        previous_status: AttendanceStatus::parse_stored(&previous)?,
        new_status: AttendanceStatus::parse_stored(&new)?,
        reason: row.try_get(col("reason").as_str())?,
        approved_by: get_uuid(row, &col("approved_by"))?,
        approved_by_role: Role::parse(&role)
            .ok_or_else(|| Error::Internal(format!("Unknown approver role '{}'", role)))?,
        approved_at: get_timestamp(row, &col("approved_at"))?,
    })
}

fn row_to_override(row: &SqliteRow) -> Result<AttendanceOverride> {
    row_to_override_prefixed(row, "")
}

/// Create or chain the override for an entry, returning the stored row
pub async fn upsert_override<'e, E>(executor: E, change: &OverrideChange) -> Result<AttendanceOverride>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        r#"
        INSERT INTO attendance_overrides ({cols})
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(entry_id) DO UPDATE SET
            previous_status = attendance_overrides.new_status,
            new_status = excluded.new_status,
            dispute_id = COALESCE(excluded.dispute_id, attendance_overrides.dispute_id),
            reason = excluded.reason,
            approved_by = excluded.approved_by,
            approved_by_role = excluded.approved_by_role,
            approved_at = excluded.approved_at
        RETURNING {cols}
        "#,
        cols = OVERRIDE_COLUMNS
    );

    let row = sqlx::query(&sql)
        .bind(uuid_utils::generate().to_string())
        .bind(change.entry_id.to_string())
        .bind(change.dispute_id.map(|d| d.to_string()))
        .bind(change.entry_status.as_str())
        .bind(change.new_status.as_str())
        .bind(&change.reason)
        .bind(change.approved_by.to_string())
        .bind(change.approved_by_role.as_str())
        .bind(time::format_timestamp(change.approved_at))
        .fetch_one(executor)
        .await?;

    row_to_override(&row)
}

pub async fn load_override_for_entry<'e, E>(executor: E, entry_id: Uuid) -> Result<Option<AttendanceOverride>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM attendance_overrides WHERE entry_id = ?", OVERRIDE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(entry_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(row_to_override).transpose()
}

/// Overrides newest first, optionally limited to one department's classes
pub async fn override_history(
    pool: &SqlitePool,
    department_id: Option<Uuid>,
    limit: i64,
) -> Result<Vec<OverrideHistoryItem>> {
    let rows = sqlx::query(
        r#"
        SELECT o.id, o.entry_id, o.dispute_id, o.previous_status, o.new_status, o.reason,
            o.approved_by, o.approved_by_role, o.approved_at,
            e.student_id AS student_id, e.lecture_id AS lecture_id, e.class_id AS class_id
        FROM attendance_overrides o
        JOIN attendance_entries e ON e.id = o.entry_id
        JOIN classes c ON c.id = e.class_id
        WHERE (?1 IS NULL OR c.department_id = ?1)
        ORDER BY o.approved_at DESC
        LIMIT ?2
        "#,
    )
    .bind(department_id.map(|d| d.to_string()))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(OverrideHistoryItem {
                override_row: row_to_override(row)?,
                student_id: get_uuid(row, "student_id")?,
                lecture_id: get_uuid(row, "lecture_id")?,
                class_id: get_uuid(row, "class_id")?,
            })
        })
        .collect()
}
