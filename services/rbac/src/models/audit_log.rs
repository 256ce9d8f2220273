//! Audit log model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use serde_json::Value;
use uuid::Uuid;

/// A privileged action about to be appended to the audit trail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAuditLogEntry {
    /// Actor, if known
    pub user_id: Option<Uuid>,
    /// Short verb or category, e.g. `create_role`
    pub action: String,
    /// The object acted upon
    pub resource: String,
    /// Arbitrarily shaped payload, stored as JSON
    pub details: Value,
    /// Origin address of the request
    pub ip_address: Option<String>,
}

/// Audit log entry as read back, joined with the actor's name and email
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub action: String,
    pub resource: String,
    pub details: Value,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Query parameters for audit log listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogQuery {
    /// Maximum number of entries, newest first
    pub limit: Option<i64>,
}

impl AuditLogQuery {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 500;

    /// The effective row limit, clamped to `1..=MAX_LIMIT`
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit_is_clamped() {
        assert_eq!(AuditLogQuery::default().effective_limit(), 100);
        assert_eq!(AuditLogQuery { limit: Some(0) }.effective_limit(), 1);
        assert_eq!(AuditLogQuery { limit: Some(-7) }.effective_limit(), 1);
        assert_eq!(AuditLogQuery { limit: Some(10_000) }.effective_limit(), 500);
        assert_eq!(AuditLogQuery { limit: Some(42) }.effective_limit(), 42);
    }
}
