//! # Audit Log Repository
//!
//! Append-only audit trail. Rows are written on the caller's connection so
//! the trail commits (or rolls back) with the action it records.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::DbResult;
use duka_core::AuditEntry;

/// Repository for audit log operations.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Appends one audit row.
    pub async fn record(
        &self,
        conn: &mut SqliteConnection,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        details: serde_json::Value,
        user_id: &str,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, action, entity_type, entity_id, details, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(details.to_string())
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// The most recent audit rows, newest first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, action, entity_type, entity_id, details, user_id, created_at
            FROM audit_log ORDER BY created_at DESC LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
