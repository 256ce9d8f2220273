//! Role repository for database operations

use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::{
    models::{NewRole, Role, UpdateRole},
    permissions::PermissionSet,
};

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    permissions: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.id,
            name: row.name,
            description: row.description,
            permissions: row
                .permissions
                .as_deref()
                .map(PermissionSet::from_serialized)
                .unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ROLE_COLUMNS: &str =
    "id, name, description, permissions::text AS permissions, created_at, updated_at";

/// Role repository for database operations
#[derive(Clone)]
pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    /// Create a new role repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get all roles ordered by name
    pub async fn get_all(&self) -> DatabaseResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(rows.into_iter().map(Role::from).collect())
    }

    /// Create a new role
    pub async fn create(&self, new_role: &NewRole) -> DatabaseResult<Role> {
        info!("Creating role: {}", new_role.name);

        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "INSERT INTO roles (name, description, permissions) VALUES ($1, $2, $3) \
             RETURNING {ROLE_COLUMNS}"
        ))
        .bind(&new_role.name)
        .bind(new_role.description.as_deref())
        .bind(new_role.permissions.to_json())
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.into())
    }

    /// Apply a partial update; `None` when no role has this ID.
    ///
    /// Users holding the role see the new permission set on their next
    /// request.
    pub async fn update(&self, id: Uuid, changes: &UpdateRole) -> DatabaseResult<Option<Role>> {
        info!("Updating role: {}", id);

        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "UPDATE roles \
             SET name = COALESCE($2, name), \
                 description = CASE WHEN $3 THEN $4 ELSE description END, \
                 permissions = COALESCE($5, permissions), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {ROLE_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.is_some())
        .bind(changes.description.clone().flatten())
        .bind(changes.permissions.as_ref().map(PermissionSet::to_json))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.map(Role::from))
    }

    /// Delete a role; its users are left without a role.
    ///
    /// Returns whether a role was deleted.
    pub async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        info!("Deleting role: {}", id);

        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }
}
