//! Persistence for the attendance service
//!
//! Tables are created by `rollcall_common::db::init`; these modules only read
//! and write rows. Functions taking a generic executor can run against the
//! pool or inside a transaction.

pub mod attendance;
pub mod audit;
pub mod disputes;
pub mod embeddings;
pub mod lectures;
pub mod overrides;
pub mod registry;

use chrono::{DateTime, Utc};
use rollcall_common::{time, uuid_utils, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

pub(crate) fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.try_get(column)?;
    uuid_utils::parse_stored(&raw)
}

pub(crate) fn get_opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    uuid_utils::parse_stored_opt(row.try_get(column)?)
}

pub(crate) fn get_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    time::parse_timestamp(&raw)
}

pub(crate) fn get_opt_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.as_deref().map(time::parse_timestamp).transpose()
}
