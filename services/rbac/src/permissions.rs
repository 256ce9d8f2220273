//! Permission vocabulary and the permission evaluator
//!
//! Roles carry their permissions as a set of plain strings. Guards only ever
//! ask about names from the closed [`Permission`] vocabulary, so an unknown
//! name stored on a role is kept but never grants anything.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::models::AuthUser;

/// Capabilities known to the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManagePages,
    ManageFiles,
    ManageSettings,
    ManageUsers,
    ManageRoles,
    ViewAuditLogs,
    ManageMapPages,
    DeleteResources,
    UploadFiles,
    EditOwnContent,
    ViewPages,
    ViewFiles,
    ViewMapPages,
}

impl Permission {
    /// Every permission in the vocabulary
    pub const ALL: [Permission; 13] = [
        Permission::ManagePages,
        Permission::ManageFiles,
        Permission::ManageSettings,
        Permission::ManageUsers,
        Permission::ManageRoles,
        Permission::ViewAuditLogs,
        Permission::ManageMapPages,
        Permission::DeleteResources,
        Permission::UploadFiles,
        Permission::EditOwnContent,
        Permission::ViewPages,
        Permission::ViewFiles,
        Permission::ViewMapPages,
    ];

    /// Stable wire name, as stored in role permission sets
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ManagePages => "manage_pages",
            Permission::ManageFiles => "manage_files",
            Permission::ManageSettings => "manage_settings",
            Permission::ManageUsers => "manage_users",
            Permission::ManageRoles => "manage_roles",
            Permission::ViewAuditLogs => "view_audit_logs",
            Permission::ManageMapPages => "manage_map_pages",
            Permission::DeleteResources => "delete_resources",
            Permission::UploadFiles => "upload_files",
            Permission::EditOwnContent => "edit_own_content",
            Permission::ViewPages => "view_pages",
            Permission::ViewFiles => "view_files",
            Permission::ViewMapPages => "view_map_pages",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|permission| permission.as_str() == s)
            .ok_or_else(|| format!("unknown permission '{}'", s))
    }
}

/// Canonical set-of-strings form of a role's permissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    /// An empty set, which grants nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize the serialized form (JSON text) of a permission set.
    ///
    /// Accepts a JSON array of strings, or a JSON string that itself holds
    /// such an array. Anything else is malformed and yields an empty set.
    pub fn from_serialized(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_json(value),
            Err(_) => Self::new(),
        }
    }

    /// Normalize a permission set held as a JSON value
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::from_json_array(items),
            Value::String(inner) => match serde_json::from_str::<Value>(&inner) {
                Ok(Value::Array(items)) => Self::from_json_array(items),
                _ => Self::new(),
            },
            _ => Self::new(),
        }
    }

    fn from_json_array(items: Vec<Value>) -> Self {
        let mut names = BTreeSet::new();
        for item in items {
            match item {
                Value::String(name) => {
                    names.insert(name);
                }
                // a set with non-string members is malformed as a whole
                _ => return Self::new(),
            }
        }
        Self(names)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names outside the [`Permission`] vocabulary
    pub fn unknown_names(&self) -> Vec<&str> {
        self.iter()
            .filter(|name| name.parse::<Permission>().is_err())
            .collect()
    }

    /// JSON array form, as stored in the `roles.permissions` column
    pub fn to_json(&self) -> Value {
        Value::Array(self.0.iter().cloned().map(Value::String).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for PermissionSet {
    fn from(names: Vec<String>) -> Self {
        names.into_iter().collect()
    }
}

/// True iff the user is present, active, and holds `permission`
pub fn has_permission(user: Option<&AuthUser>, permission: Permission) -> bool {
    match user {
        Some(user) => user.is_active && user.permissions.contains(permission.as_str()),
        None => false,
    }
}

/// True iff at least one of `permissions` is held.
///
/// An empty requirement list never authorizes.
pub fn has_any_permission(user: Option<&AuthUser>, permissions: &[Permission]) -> bool {
    permissions
        .iter()
        .any(|permission| has_permission(user, *permission))
}
