//! User directory lookup
//!
//! Resolves the identity key carried by a request to an active user joined
//! with its role's permission set. Lookups are fail-closed: a missing user,
//! an inactive user and a storage failure all resolve to `None`.

use async_trait::async_trait;
use common::error::DatabaseResult;
use tracing::{debug, error};

use crate::models::AuthUser;

/// Store-facing half of the directory
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find the active user whose identity key (email) is `identity`.
    ///
    /// Implementations return the role's permissions already normalized.
    async fn find_active_user(&self, identity: &str) -> DatabaseResult<Option<AuthUser>>;
}

/// Resolve `identity` to a usable principal.
///
/// Storage errors are reported to the operator log and collapse to `None`;
/// they never reach the caller's control flow.
pub async fn resolve_user(directory: &dyn UserDirectory, identity: &str) -> Option<AuthUser> {
    let identity = identity.trim();
    if identity.is_empty() {
        return None;
    }

    match directory.find_active_user(identity).await {
        Ok(Some(user)) if user.is_active => Some(user),
        Ok(_) => {
            debug!(identity, "No active user for identity");
            None
        }
        Err(e) => {
            error!(identity, error = %e, "User lookup failed, treating caller as unresolved");
            None
        }
    }
}
