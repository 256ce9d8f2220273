//! RBAC service routes

use axum::{
    Extension, Json, Router,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use common::error::DatabaseError;
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    AppState,
    directory::resolve_user,
    error::{ApiError, ApiResult},
    middleware::{UserIdentity, client_ip, enforce},
    models::{AuditLogQuery, AuthUser, NewRole, NewUser, UpdateRole, UpdateUser},
    permissions::Permission,
    validation::{validate_display_name, validate_email, validate_role_name},
};

/// Create the router for the RBAC service
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let rbac_routes = Router::new()
        .route(
            "/me",
            get(get_me).route_layer(middleware::from_fn_with_state(
                state.require_auth(),
                enforce,
            )),
        )
        .route(
            "/users",
            get(get_users)
                .post(create_user)
                .route_layer(middleware::from_fn_with_state(
                    state.require_permission(Permission::ManageUsers),
                    enforce,
                )),
        )
        .route(
            "/users/:id",
            put(update_user).route_layer(middleware::from_fn_with_state(
                state.require_permission(Permission::ManageUsers),
                enforce,
            )),
        )
        .route(
            "/roles",
            get(get_roles)
                .route_layer(middleware::from_fn_with_state(
                    state.require_any_permission([Permission::ManageRoles, Permission::ManageUsers]),
                    enforce,
                ))
                .merge(post(create_role).route_layer(middleware::from_fn_with_state(
                    state.require_permission(Permission::ManageRoles),
                    enforce,
                ))),
        )
        .route(
            "/roles/:id",
            put(update_role)
                .delete(delete_role)
                .route_layer(middleware::from_fn_with_state(
                    state.require_permission(Permission::ManageRoles),
                    enforce,
                )),
        )
        .route(
            "/audit-logs",
            get(get_audit_logs).route_layer(middleware::from_fn_with_state(
                state.require_permission(Permission::ViewAuditLogs),
                enforce,
            )),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/rbac", rbac_routes)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);

    Json(json!({
        "status": "ok",
        "service": "rbac-service",
        "database": database,
    }))
}

/// The caller's own resolved user record
pub async fn get_me(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_user(state.directory.as_ref(), &identity.0)
        .await
        .ok_or(ApiError::UserUnresolvable)?;

    let user_repository = state.user_repository.clone();
    let user_id = user.id;
    tokio::spawn(async move {
        if let Err(e) = user_repository.touch_last_login(user_id).await {
            warn!("Failed to update last login for {}: {}", user_id, e);
        }
    });

    Ok(Json(json!({ "user": user })))
}

/// List users with their role names
pub async fn get_users(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let users = state.user_repository.get_all().await.map_err(|e| {
        error!("Failed to get users: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(json!({ "users": users })))
}

/// Create a new user
pub async fn create_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(mut payload): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    payload.email = payload.email.trim().to_string();
    payload.name = payload.name.trim().to_string();
    validate_email(&payload.email).map_err(ApiError::BadRequest)?;
    validate_display_name(&payload.name).map_err(ApiError::BadRequest)?;

    let user = state
        .user_repository
        .create(&payload)
        .await
        .map_err(|e| write_error(e, "A user with this email already exists"))?;

    state
        .audit
        .record(
            Some(actor.id),
            "create_user",
            format!("user:{}", user.id),
            json!({ "email": user.email, "role_id": user.role_id }),
            client_ip(&headers, connect_info.as_ref()),
        );

    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

/// Update a user's name, role or active flag
pub async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(mut payload): Json<UpdateUser>,
) -> ApiResult<impl IntoResponse> {
    if payload.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    payload.trim_name();
    if let Some(name) = &payload.name {
        validate_display_name(name).map_err(ApiError::BadRequest)?;
    }

    let user = state
        .user_repository
        .update(id, &payload)
        .await
        .map_err(|e| write_error(e, "Conflicting user update"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    state
        .audit
        .record(
            Some(actor.id),
            "update_user",
            format!("user:{}", user.id),
            json!(payload),
            client_ip(&headers, connect_info.as_ref()),
        );

    Ok(Json(json!({ "user": user })))
}

/// List roles
pub async fn get_roles(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let roles = state.role_repository.get_all().await.map_err(|e| {
        error!("Failed to get roles: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(json!({ "roles": roles })))
}

/// Create a new role
pub async fn create_role(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(mut payload): Json<NewRole>,
) -> ApiResult<impl IntoResponse> {
    payload.name = payload.name.trim().to_string();
    validate_role_name(&payload.name).map_err(ApiError::BadRequest)?;

    let unknown = payload.permissions.unknown_names();
    if !unknown.is_empty() {
        warn!(role = %payload.name, ?unknown, "Role carries permissions outside the vocabulary");
    }

    let role = state
        .role_repository
        .create(&payload)
        .await
        .map_err(|e| write_error(e, "A role with this name already exists"))?;

    state
        .audit
        .record(
            Some(actor.id),
            "create_role",
            format!("role:{}", role.id),
            json!({ "name": role.name, "permissions": role.permissions }),
            client_ip(&headers, connect_info.as_ref()),
        );

    Ok((StatusCode::CREATED, Json(json!({ "role": role }))))
}

/// Update a role; takes effect on its users' next request
pub async fn update_role(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(mut payload): Json<UpdateRole>,
) -> ApiResult<impl IntoResponse> {
    if payload.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    payload.trim_name();
    if let Some(name) = &payload.name {
        validate_role_name(name).map_err(ApiError::BadRequest)?;
    }
    if let Some(permissions) = &payload.permissions {
        let unknown = permissions.unknown_names();
        if !unknown.is_empty() {
            warn!(role_id = %id, ?unknown, "Role carries permissions outside the vocabulary");
        }
    }

    let role = state
        .role_repository
        .update(id, &payload)
        .await
        .map_err(|e| write_error(e, "A role with this name already exists"))?
        .ok_or_else(|| ApiError::NotFound("Role not found".to_string()))?;

    state
        .audit
        .record(
            Some(actor.id),
            "update_role",
            format!("role:{}", role.id),
            json!(payload),
            client_ip(&headers, connect_info.as_ref()),
        );

    Ok(Json(json!({ "role": role })))
}

/// Delete a role; its users are left without any permission
pub async fn delete_role(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state.role_repository.delete(id).await.map_err(|e| {
        error!("Failed to delete role: {}", e);
        ApiError::from(e)
    })?;

    if !deleted {
        return Err(ApiError::NotFound("Role not found".to_string()));
    }

    state
        .audit
        .record(
            Some(actor.id),
            "delete_role",
            format!("role:{}", id),
            json!({}),
            client_ip(&headers, connect_info.as_ref()),
        );

    Ok(Json(json!({ "message": "Role deleted successfully" })))
}

/// Most recent audit entries
pub async fn get_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<impl IntoResponse> {
    let logs = state
        .audit_log_repository
        .list_recent(&query)
        .await
        .map_err(|e| {
            error!("Failed to get audit logs: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(json!({ "logs": logs })))
}

/// Map a failed write to a client error where the store reports one
fn write_error(e: DatabaseError, conflict_message: &str) -> ApiError {
    if e.is_unique_violation() {
        ApiError::Conflict(conflict_message.to_string())
    } else if e.is_foreign_key_violation() {
        ApiError::BadRequest("Unknown role".to_string())
    } else {
        error!("Database write failed: {}", e);
        ApiError::from(e)
    }
}
