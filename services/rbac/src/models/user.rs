//! User model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::permissions::PermissionSet;

/// User entity as listed by the admin surface
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role_id: Option<Uuid>,
    pub role_name: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A resolved principal: an active user joined with its role's permissions.
///
/// Built fresh by the user directory for every request and never cached.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role_id: Option<Uuid>,
    pub role_name: Option<String>,
    pub is_active: bool,
    pub permissions: PermissionSet,
}

/// New user creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role_id: Option<Uuid>,
}

/// User update payload
///
/// `role_id: null` detaches the user from its role, an absent `role_id`
/// leaves it unchanged. Serializing keeps that distinction: absent fields
/// are omitted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "super::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub role_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl UpdateUser {
    pub fn trim_name(&mut self) {
        if let Some(name) = self.name.as_mut() {
            *name = name.trim().to_string();
        }
    }

    /// Whether the payload changes anything at all
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.role_id.is_none() && self.is_active.is_none()
    }
}
