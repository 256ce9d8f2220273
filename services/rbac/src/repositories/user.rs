//! User repository and the PostgreSQL-backed user directory

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::{
    directory::UserDirectory,
    models::{AuthUser, NewUser, UpdateUser, User},
    permissions::PermissionSet,
};

/// Directory lookup over `rbac_users` left-joined with `roles`
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Create a new directory over the given pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_active_user(&self, identity: &str) -> DatabaseResult<Option<AuthUser>> {
        // permissions are read as text so that both a JSON array and a
        // JSON-encoded string normalize through the same path
        let row = sqlx::query(
            r#"
            SELECT u.id, u.email, u.name, u.role_id, u.is_active,
                   r.name AS role_name, r.permissions::text AS permissions
            FROM rbac_users u
            LEFT JOIN roles r ON u.role_id = r.id
            WHERE u.email = $1 AND u.is_active = true
            "#,
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let permissions: Option<String> = row.try_get("permissions").map_err(DatabaseError::Query)?;
        let permissions = permissions
            .as_deref()
            .map(PermissionSet::from_serialized)
            .unwrap_or_default();

        Ok(Some(AuthUser {
            id: row.try_get("id").map_err(DatabaseError::Query)?,
            email: row.try_get("email").map_err(DatabaseError::Query)?,
            name: row.try_get("name").map_err(DatabaseError::Query)?,
            role_id: row.try_get("role_id").map_err(DatabaseError::Query)?,
            role_name: row.try_get("role_name").map_err(DatabaseError::Query)?,
            is_active: row.try_get("is_active").map_err(DatabaseError::Query)?,
            permissions,
        }))
    }
}

/// User repository for the admin surface
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get all users with their role names
    pub async fn get_all(&self) -> DatabaseResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.name, u.role_id, r.name AS role_name,
                   u.is_active, u.last_login, u.created_at
            FROM rbac_users u
            LEFT JOIN roles r ON u.role_id = r.id
            ORDER BY u.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    /// Create a new, active user
    pub async fn create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        info!("Creating RBAC user: {}", new_user.email);

        sqlx::query_as::<_, User>(
            r#"
            WITH inserted AS (
                INSERT INTO rbac_users (email, name, role_id)
                VALUES ($1, $2, $3)
                RETURNING id, email, name, role_id, is_active, last_login, created_at
            )
            SELECT i.id, i.email, i.name, i.role_id, r.name AS role_name,
                   i.is_active, i.last_login, i.created_at
            FROM inserted i
            LEFT JOIN roles r ON i.role_id = r.id
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(new_user.role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    /// Apply a partial update; `None` when no user has this ID
    pub async fn update(&self, id: Uuid, changes: &UpdateUser) -> DatabaseResult<Option<User>> {
        info!("Updating RBAC user: {}", id);

        sqlx::query_as::<_, User>(
            r#"
            WITH updated AS (
                UPDATE rbac_users
                SET name = COALESCE($2, name),
                    role_id = CASE WHEN $3 THEN $4 ELSE role_id END,
                    is_active = COALESCE($5, is_active)
                WHERE id = $1
                RETURNING id, email, name, role_id, is_active, last_login, created_at
            )
            SELECT u.id, u.email, u.name, u.role_id, r.name AS role_name,
                   u.is_active, u.last_login, u.created_at
            FROM updated u
            LEFT JOIN roles r ON u.role_id = r.id
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.role_id.is_some())
        .bind(changes.role_id.flatten())
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    /// Stamp the user's `last_login` with the current time
    pub async fn touch_last_login(&self, id: Uuid) -> DatabaseResult<()> {
        sqlx::query("UPDATE rbac_users SET last_login = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(())
    }
}
