//! Audit ledger persistence
//!
//! Insert and select only. There is no UPDATE or DELETE path for
//! `audit_logs`; a mistake is corrected by appending a compensating row.

use chrono::{DateTime, Utc};
use rollcall_common::{time, uuid_utils, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::{get_timestamp, get_uuid};
use crate::models::{AuditAction, AuditEntityType, AuditFilter, AuditLog, NewAuditLog, Pagination, Role};

const AUDIT_COLUMNS: &str =
    "id, action, performed_by, performed_by_role, entity_type, entity_id, payload, timestamp";

fn row_to_audit(row: &SqliteRow) -> Result<AuditLog> {
    let action: String = row.try_get("action")?;
    let role: String = row.try_get("performed_by_role")?;
    let entity_type: String = row.try_get("entity_type")?;
    let payload: String = row.try_get("payload")?;

    Ok(AuditLog {
        id: get_uuid(row, "id")?,
        action: AuditAction::parse(&action)
            .ok_or_else(|| Error::Internal(format!("Unknown audit action '{}'", action)))?,
        performed_by: get_uuid(row, "performed_by")?,
        performed_by_role: Role::parse(&role)
            .ok_or_else(|| Error::Internal(format!("Unknown audit role '{}'", role)))?,
        entity_type: AuditEntityType::parse(&entity_type)
            .ok_or_else(|| Error::Internal(format!("Unknown audit entity '{}'", entity_type)))?,
        entity_id: get_uuid(row, "entity_id")?,
        payload: serde_json::from_str(&payload)
            .map_err(|e| Error::Internal(format!("Corrupt audit payload: {}", e)))?,
        timestamp: get_timestamp(row, "timestamp")?,
    })
}

/// Append one row to the ledger
pub async fn append<'e, E>(executor: E, entry: NewAuditLog, timestamp: DateTime<Utc>) -> Result<AuditLog>
where
    E: SqliteExecutor<'e>,
{
    let log = AuditLog {
        id: uuid_utils::generate(),
        action: entry.action,
        performed_by: entry.performed_by,
        performed_by_role: entry.performed_by_role,
        entity_type: entry.entity_type,
        entity_id: entry.entity_id,
        payload: entry.payload,
        timestamp,
    };

    let sql = format!("INSERT INTO audit_logs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)", AUDIT_COLUMNS);
    sqlx::query(&sql)
        .bind(log.id.to_string())
        .bind(log.action.as_str())
        .bind(log.performed_by.to_string())
        .bind(log.performed_by_role.as_str())
        .bind(log.entity_type.as_str())
        .bind(log.entity_id.to_string())
        .bind(log.payload.to_string())
        .bind(time::format_timestamp(log.timestamp))
        .execute(executor)
        .await?;

    Ok(log)
}

/// Filtered page of the ledger, newest first, with the total match count
pub async fn query(pool: &SqlitePool, filter: &AuditFilter, page: &Pagination) -> Result<(Vec<AuditLog>, i64)> {
    let action = filter.action.map(|a| a.as_str());
    let entity_type = filter.entity_type.map(|t| t.as_str());
    let actor = filter.performed_by.map(|a| a.to_string());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM audit_logs
        WHERE (?1 IS NULL OR action = ?1)
          AND (?2 IS NULL OR entity_type = ?2)
          AND (?3 IS NULL OR performed_by = ?3)
        "#,
    )
    .bind(action)
    .bind(entity_type)
    .bind(&actor)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        r#"
        SELECT {} FROM audit_logs
        WHERE (?1 IS NULL OR action = ?1)
          AND (?2 IS NULL OR entity_type = ?2)
          AND (?3 IS NULL OR performed_by = ?3)
        ORDER BY timestamp DESC, seq DESC
        LIMIT ?4 OFFSET ?5
        "#,
        AUDIT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(action)
        .bind(entity_type)
        .bind(&actor)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await?;

    let logs = rows.iter().map(row_to_audit).collect::<Result<Vec<_>>>()?;
    Ok((logs, total))
}

/// Latest `limit` rows across the whole ledger, newest first
pub async fn recent(pool: &SqlitePool, limit: i64) -> Result<Vec<AuditLog>> {
    let sql = format!(
        "SELECT {} FROM audit_logs ORDER BY timestamp DESC, seq DESC LIMIT ?",
        AUDIT_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(limit).fetch_all(pool).await?;

    rows.iter().map(row_to_audit).collect()
}

/// Rows referencing one entity, in the order they were written
pub async fn for_entity(pool: &SqlitePool, entity_id: Uuid) -> Result<Vec<AuditLog>> {
    let sql = format!("SELECT {} FROM audit_logs WHERE entity_id = ? ORDER BY seq", AUDIT_COLUMNS);
    let rows = sqlx::query(&sql)
        .bind(entity_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_audit).collect()
}
