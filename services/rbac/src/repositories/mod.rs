//! Repositories for database operations

pub mod audit_log;
pub mod role;
pub mod user;

pub use audit_log::{AuditLogRepository, PgAuditSink};
pub use role::RoleRepository;
pub use user::{PgUserDirectory, UserRepository};
