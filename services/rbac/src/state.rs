//! Application state shared across handlers

use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    audit::AuditRecorder,
    directory::UserDirectory,
    middleware::Gate,
    permissions::Permission,
    repositories::{AuditLogRepository, PgAuditSink, PgUserDirectory, RoleRepository, UserRepository},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub directory: Arc<dyn UserDirectory>,
    pub audit: AuditRecorder,
    pub user_repository: UserRepository,
    pub role_repository: RoleRepository,
    pub audit_log_repository: AuditLogRepository,
}

impl AppState {
    /// Wire every component to the one store client
    pub fn new(pool: PgPool) -> Self {
        Self {
            directory: Arc::new(PgUserDirectory::new(pool.clone())),
            audit: AuditRecorder::new(Arc::new(PgAuditSink::new(pool.clone()))),
            user_repository: UserRepository::new(pool.clone()),
            role_repository: RoleRepository::new(pool.clone()),
            audit_log_repository: AuditLogRepository::new(pool.clone()),
            db_pool: pool,
        }
    }

    /// "Require identity" guard
    pub fn require_auth(&self) -> Gate {
        Gate::require_auth(self.directory.clone())
    }

    /// "Require one permission" guard
    pub fn require_permission(&self, permission: Permission) -> Gate {
        Gate::require_permission(self.directory.clone(), permission)
    }

    /// "Require any of these permissions" guard
    pub fn require_any_permission(&self, permissions: impl IntoIterator<Item = Permission>) -> Gate {
        Gate::require_any_permission(self.directory.clone(), permissions)
    }
}
