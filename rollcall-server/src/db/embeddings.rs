//! Stored student face embeddings
//!
//! One row per student, overwritten on re-enrollment. Vectors are stored as
//! JSON arrays.

use chrono::{DateTime, Utc};
use rollcall_common::{time, Error, Result};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use super::get_uuid;
use crate::models::Embedding;

/// Insert or overwrite a student's embedding (last writer wins)
pub async fn upsert_embedding(
    pool: &SqlitePool,
    student_id: Uuid,
    embedding: &Embedding,
    now: DateTime<Utc>,
) -> Result<()> {
    let json = serde_json::to_string(embedding)
        .map_err(|e| Error::Internal(format!("Failed to serialize embedding: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO student_embeddings (student_id, embedding, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(student_id) DO UPDATE SET
            embedding = excluded.embedding,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(student_id.to_string())
    .bind(json)
    .bind(time::format_timestamp(now))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_embedding(pool: &SqlitePool, student_id: Uuid) -> Result<Option<Embedding>> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT embedding FROM student_embeddings WHERE student_id = ?")
            .bind(student_id.to_string())
            .fetch_optional(pool)
            .await?;

    raw.map(|json| {
        serde_json::from_str(&json)
            .map_err(|e| Error::Internal(format!("Corrupt embedding for {}: {}", student_id, e)))
    })
    .transpose()
}

/// Embeddings of the given students; students without one are absent from the map
///
/// A row that no longer parses as a valid embedding is skipped with a warning.
pub async fn load_embeddings(pool: &SqlitePool, student_ids: &[Uuid]) -> Result<HashMap<Uuid, Embedding>> {
    if student_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let ids: Vec<String> = student_ids.iter().map(|id| id.to_string()).collect();
    let ids_json = serde_json::to_string(&ids)
        .map_err(|e| Error::Internal(format!("Failed to serialize id list: {}", e)))?;

    let rows = sqlx::query(
        r#"
        SELECT student_id, embedding FROM student_embeddings
        WHERE student_id IN (SELECT value FROM json_each(?))
        "#,
    )
    .bind(ids_json)
    .fetch_all(pool)
    .await?;

    let mut embeddings = HashMap::with_capacity(rows.len());
    for row in &rows {
        let student_id = get_uuid(row, "student_id")?;
        let json: String = row.try_get("embedding")?;
        match serde_json::from_str::<Embedding>(&json) {
            Ok(embedding) => {
                embeddings.insert(student_id, embedding);
            }
            Err(e) => warn!(student_id = %student_id, "Skipping unreadable stored embedding: {}", e),
        }
    }

    Ok(embeddings)
}
