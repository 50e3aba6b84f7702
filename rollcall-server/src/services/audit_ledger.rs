//! Audit ledger queries
//!
//! Rows are appended by the dispute and override services inside their own
//! transactions; this service only reads.

use sqlx::SqlitePool;

use super::require_role;
use crate::db::audit;
use crate::error::AttendanceResult;
use crate::models::{Actor, AuditFilter, AuditLog, AuditPage, Pagination, Role};

/// Entries returned by the recent-activity view
pub const RECENT_ACTIVITY_LIMIT: i64 = 20;

#[derive(Clone)]
pub struct AuditLedger {
    db: SqlitePool,
}

impl AuditLedger {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Filtered, paginated ledger, newest first
    pub async fn query(&self, actor: &Actor, filter: &AuditFilter, page: Pagination) -> AttendanceResult<AuditPage> {
        require_role(actor, &[Role::Admin, Role::Hod], "read the audit log")?;

        let (logs, total) = audit::query(&self.db, filter, &page).await?;
        Ok(AuditPage {
            logs,
            total,
            page: page.page,
            pages: page.total_pages(total),
        })
    }

    /// Last entries across the whole ledger
    pub async fn recent(&self, actor: &Actor) -> AttendanceResult<Vec<AuditLog>> {
        require_role(actor, &[Role::Admin, Role::Hod], "read the audit log")?;
        Ok(audit::recent(&self.db, RECENT_ACTIVITY_LIMIT).await?)
    }
}
