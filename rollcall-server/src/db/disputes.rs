//! Attendance dispute persistence

use chrono::{DateTime, Utc};
use rollcall_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::{get_opt_timestamp, get_opt_uuid, get_timestamp, get_uuid};
use crate::models::lifecycle::parse_stored;
use crate::models::{AttendanceDispute, DisputeStatus, Lifecycle};

const DISPUTE_COLUMNS: &str = "id, entry_id, student_id, lecture_id, class_id, reason, status, resolved_by, resolved_at, created_at";

fn row_to_dispute(row: &SqliteRow) -> Result<AttendanceDispute> {
    let status: String = row.try_get("status")?;
    Ok(AttendanceDispute {
        id: get_uuid(row, "id")?,
        entry_id: get_uuid(row, "entry_id")?,
        student_id: get_uuid(row, "student_id")?,
        lecture_id: get_uuid(row, "lecture_id")?,
        class_id: get_uuid(row, "class_id")?,
        reason: row.try_get("reason")?,
        status: parse_stored(&status)?,
        resolved_by: get_opt_uuid(row, "resolved_by")?,
        resolved_at: get_opt_timestamp(row, "resolved_at")?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

/// Insert a new dispute
///
/// A second dispute for the same entry fails with a unique violation.
pub async fn insert_dispute<'e, E>(executor: E, dispute: &AttendanceDispute) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO attendance_disputes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        DISPUTE_COLUMNS
    );
    sqlx::query(&sql)
        .bind(dispute.id.to_string())
        .bind(dispute.entry_id.to_string())
        .bind(dispute.student_id.to_string())
        .bind(dispute.lecture_id.to_string())
        .bind(dispute.class_id.to_string())
        .bind(&dispute.reason)
        .bind(dispute.status.as_str())
        .bind(dispute.resolved_by.map(|r| r.to_string()))
        .bind(dispute.resolved_at.map(time::format_timestamp))
        .bind(time::format_timestamp(dispute.created_at))
        .execute(executor)
        .await?;

    Ok(())
}

pub async fn load_dispute<'e, E>(executor: E, dispute_id: Uuid) -> Result<Option<AttendanceDispute>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM attendance_disputes WHERE id = ?", DISPUTE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(dispute_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(row_to_dispute).transpose()
}

/// Resolve an OPEN dispute
///
/// Returns `false` when the dispute is no longer OPEN.
pub async fn resolve_open<'e, E>(
    executor: E,
    dispute_id: Uuid,
    status: DisputeStatus,
    resolved_by: Uuid,
    resolved_at: DateTime<Utc>,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE attendance_disputes
        SET status = ?, resolved_by = ?, resolved_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(status.as_str())
    .bind(resolved_by.to_string())
    .bind(time::format_timestamp(resolved_at))
    .bind(dispute_id.to_string())
    .bind(DisputeStatus::Open.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Force every dispute on `entry_id` to ADMIN_OVERRIDDEN, whatever its state
///
/// Returns the number of disputes touched.
pub async fn force_admin_overridden<'e, E>(
    executor: E,
    entry_id: Uuid,
    resolved_by: Uuid,
    resolved_at: DateTime<Utc>,
) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE attendance_disputes SET status = ?, resolved_by = ?, resolved_at = ? WHERE entry_id = ?",
    )
    .bind(DisputeStatus::AdminOverridden.as_str())
    .bind(resolved_by.to_string())
    .bind(time::format_timestamp(resolved_at))
    .bind(entry_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn disputes_for_entry<'e, E>(executor: E, entry_id: Uuid) -> Result<Vec<AttendanceDispute>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM attendance_disputes WHERE entry_id = ?", DISPUTE_COLUMNS);
    let rows = sqlx::query(&sql)
        .bind(entry_id.to_string())
        .fetch_all(executor)
        .await?;

    rows.iter().map(row_to_dispute).collect()
}

/// A student's disputes, newest first
pub async fn disputes_for_student(pool: &SqlitePool, student_id: Uuid) -> Result<Vec<AttendanceDispute>> {
    let sql = format!(
        "SELECT {} FROM attendance_disputes WHERE student_id = ? ORDER BY created_at DESC",
        DISPUTE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(student_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_dispute).collect()
}

/// A class's disputes: OPEN first, then oldest first
pub async fn disputes_for_class(pool: &SqlitePool, class_id: Uuid) -> Result<Vec<AttendanceDispute>> {
    let sql = format!(
        r#"
        SELECT {} FROM attendance_disputes
        WHERE class_id = ?
        ORDER BY CASE status WHEN 'OPEN' THEN 0 ELSE 1 END, created_at ASC
        "#,
        DISPUTE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(class_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_dispute).collect()
}
