//! Key/value access to the `settings` table

use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Read a setting; `None` when the key is missing or NULL
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

/// Write a setting, replacing any existing value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Read a setting, writing `default` back when it is missing or NULL
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default: &str) -> Result<String> {
    match get_setting(pool, key).await? {
        Some(value) => Ok(value),
        None => {
            info!("Setting '{}' not found in database, using default: {}", key, default);
            set_setting(pool, key, default).await?;
            Ok(default.to_string())
        }
    }
}
