//! RBAC service models

pub mod audit_log;
pub mod role;
pub mod user;

// Re-export for convenience
pub use audit_log::{AuditLogEntry, AuditLogQuery, NewAuditLogEntry};
pub use role::{NewRole, Role, UpdateRole};
pub use user::{AuthUser, NewUser, UpdateUser, User};

use serde::{Deserialize, Deserializer};

/// Distinguishes an absent field from an explicit `null` in update payloads
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
