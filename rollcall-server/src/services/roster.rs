//! Read access to the class/enrollment registry

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::registry;
use crate::error::AttendanceResult;
use crate::models::{ClassInfo, TimetableSlot};

/// What the attendance core reads from the registry
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn class(&self, class_id: Uuid) -> AttendanceResult<Option<ClassInfo>>;

    async fn slot(&self, slot_id: Uuid) -> AttendanceResult<Option<TimetableSlot>>;

    /// APPROVED students, in a stable order
    async fn approved_students(&self, class_id: Uuid) -> AttendanceResult<Vec<Uuid>>;
}

/// Registry backed by the local registry tables
#[derive(Clone)]
pub struct SqliteRoster {
    db: SqlitePool,
}

impl SqliteRoster {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RosterProvider for SqliteRoster {
    async fn class(&self, class_id: Uuid) -> AttendanceResult<Option<ClassInfo>> {
        Ok(registry::load_class(&self.db, class_id).await?)
    }

    async fn slot(&self, slot_id: Uuid) -> AttendanceResult<Option<TimetableSlot>> {
        Ok(registry::load_slot(&self.db, slot_id).await?)
    }

    async fn approved_students(&self, class_id: Uuid) -> AttendanceResult<Vec<Uuid>> {
        Ok(registry::approved_students(&self.db, class_id).await?)
    }
}
