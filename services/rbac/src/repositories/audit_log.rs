//! Audit log persistence: the append-only sink and the read model

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;

use crate::{
    audit::AuditSink,
    models::{AuditLogEntry, AuditLogQuery, NewAuditLogEntry},
};

/// Appends audit entries to the `audit_logs` table
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, entry: &NewAuditLogEntry) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, resource, details, ip_address)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.resource)
        .bind(&entry.details)
        .bind(entry.ip_address.as_deref())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(())
    }
}

/// Read access to the audit trail
#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    /// Create a new audit log repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recent entries first, joined with the actor's name and email
    pub async fn list_recent(&self, query: &AuditLogQuery) -> DatabaseResult<Vec<AuditLogEntry>> {
        sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT a.id, a.user_id, u.name AS user_name, u.email AS user_email,
                   a.action, a.resource, a.details, a.ip_address, a.created_at
            FROM audit_logs a
            LEFT JOIN rbac_users u ON a.user_id = u.id
            ORDER BY a.created_at DESC, a.id
            LIMIT $1
            "#,
        )
        .bind(query.effective_limit())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }
}
