//! Audit recorder
//!
//! Appends one entry per privileged action. Recording is best effort: the
//! append runs on its own task, so neither a slow nor a failed write reaches
//! the response of the action being recorded. Failures are logged for
//! operators and dropped without retry.

use async_trait::async_trait;
use common::error::DatabaseResult;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

use crate::models::NewAuditLogEntry;

/// Append-only destination for audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &NewAuditLogEntry) -> DatabaseResult<()>;
}

/// Handle used by handlers to record actions after they succeed
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    /// Create a recorder writing to `sink`
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Append an entry, surfacing the storage result.
    ///
    /// Callers that do not care about the outcome use [`AuditRecorder::record`].
    pub async fn try_record(&self, entry: NewAuditLogEntry) -> DatabaseResult<()> {
        self.sink.append(&entry).await
    }

    /// Record an action in the background, swallowing any storage failure.
    ///
    /// A `null` details payload is stored as an empty object. The returned
    /// handle completes once the append has finished; handlers drop it.
    pub fn record(
        &self,
        user_id: Option<Uuid>,
        action: &str,
        resource: impl Into<String>,
        details: Value,
        ip_address: Option<String>,
    ) -> JoinHandle<()> {
        let details = if details.is_null() { json!({}) } else { details };
        let entry = NewAuditLogEntry {
            user_id,
            action: action.to_string(),
            resource: resource.into(),
            details,
            ip_address,
        };
        let sink = self.sink.clone();

        tokio::spawn(async move {
            match sink.append(&entry).await {
                Ok(()) => debug!(action = %entry.action, "Audit entry recorded"),
                Err(e) => error!(
                    action = %entry.action,
                    resource = %entry.resource,
                    error = %e,
                    "Failed to record audit entry"
                ),
            }
        })
    }
}
