//! Access-control gate for the admin endpoints
//!
//! Every request walks the same path: the identity header is read (401 when
//! missing), the identity is resolved through the user directory (403 when it
//! does not resolve to an active user) and the required permissions are
//! evaluated (403 naming them when they are not held). Nothing is cached
//! between requests, so role edits apply to the very next call.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{self, Header, HeaderMapExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    directory::{UserDirectory, resolve_user},
    error::{ApiError, ApiResult, RequiredPermissions},
    models::AuthUser,
    permissions::{Permission, has_any_permission, has_permission},
};

static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

/// The caller-supplied identity key (`x-user-id` header).
///
/// Its authenticity is established upstream; an empty or non-UTF-8 value is
/// treated as no identity at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity(pub String);

impl Header for UserIdentity {
    fn name() -> &'static HeaderName {
        &X_USER_ID
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let identity = value
            .to_str()
            .map_err(|_| headers::Error::invalid())?
            .trim();

        if identity.is_empty() {
            return Err(headers::Error::invalid());
        }

        Ok(UserIdentity(identity.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}

/// What a guarded route demands of its caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Only an identity header
    Identity,
    /// A single permission
    Permission(Permission),
    /// At least one of the listed permissions; an empty list admits nobody
    AnyOf(Vec<Permission>),
}

/// Outcome of a successful gate pass
#[derive(Debug, Clone)]
pub enum Admission {
    /// Identity present, no lookup performed
    Identified(UserIdentity),
    /// Identity resolved and permissions satisfied
    Authorized {
        identity: UserIdentity,
        user: AuthUser,
    },
}

/// A guard bound to one requirement, used as middleware state
#[derive(Clone)]
pub struct Gate {
    directory: Arc<dyn UserDirectory>,
    requirement: Requirement,
}

impl Gate {
    /// Guard that only requires an identity
    pub fn require_auth(directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            directory,
            requirement: Requirement::Identity,
        }
    }

    /// Guard that requires `permission`
    pub fn require_permission(directory: Arc<dyn UserDirectory>, permission: Permission) -> Self {
        Self {
            directory,
            requirement: Requirement::Permission(permission),
        }
    }

    /// Guard that requires any one of `permissions`
    pub fn require_any_permission(
        directory: Arc<dyn UserDirectory>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            directory,
            requirement: Requirement::AnyOf(permissions.into_iter().collect()),
        }
    }

    /// Decide whether a request carrying `headers` may proceed
    pub async fn check(&self, headers: &HeaderMap) -> ApiResult<Admission> {
        let identity = headers
            .typed_get::<UserIdentity>()
            .ok_or(ApiError::AuthenticationRequired)?;

        let required = match &self.requirement {
            Requirement::Identity => return Ok(Admission::Identified(identity)),
            Requirement::Permission(permission) => RequiredPermissions::One(*permission),
            Requirement::AnyOf(permissions) => RequiredPermissions::AnyOf(permissions.clone()),
        };

        let user = resolve_user(self.directory.as_ref(), &identity.0)
            .await
            .ok_or_else(|| {
                warn!(identity = %identity.0, "Rejected request from unresolvable user");
                ApiError::UserUnresolvable
            })?;

        let allowed = match &required {
            RequiredPermissions::One(permission) => has_permission(Some(&user), *permission),
            RequiredPermissions::AnyOf(permissions) => has_any_permission(Some(&user), permissions),
        };

        if !allowed {
            warn!(identity = %identity.0, required = %required, "Rejected request lacking permissions");
            return Err(ApiError::PermissionDenied { required });
        }

        debug!(identity = %identity.0, required = %required, "Request authorized");
        Ok(Admission::Authorized { identity, user })
    }
}

/// Gate middleware; use with `middleware::from_fn_with_state(gate, enforce)`.
///
/// On success the [`UserIdentity`] and, when resolved, the [`AuthUser`] are
/// inserted into the request extensions for the downstream handler.
pub async fn enforce(
    State(gate): State<Gate>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    match gate.check(req.headers()).await? {
        Admission::Identified(identity) => {
            req.extensions_mut().insert(identity);
        }
        Admission::Authorized { identity, user } => {
            req.extensions_mut().insert(identity);
            req.extensions_mut().insert(user);
        }
    }

    Ok(next.run(req).await)
}

/// Origin address of a request: the first `x-forwarded-for` hop, falling
/// back to the peer address
pub fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());

    match forwarded {
        Some(hop) => Some(hop.to_string()),
        None => connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionSet;
    use axum::{
        Extension, Json, Router,
        body::to_bytes,
        http::StatusCode,
        middleware,
        routing::get,
    };
    use common::error::{DatabaseError, DatabaseResult};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeDirectory {
        users: HashMap<String, AuthUser>,
        unavailable: bool,
        lookups: AtomicUsize,
    }

    impl FakeDirectory {
        fn with(users: Vec<AuthUser>) -> Arc<Self> {
            Arc::new(Self {
                users: users.into_iter().map(|u| (u.email.clone(), u)).collect(),
                ..Self::default()
            })
        }

        fn unavailable() -> Arc<Self> {
            Arc::new(Self {
                unavailable: true,
                ..Self::default()
            })
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl UserDirectory for FakeDirectory {
        async fn find_active_user(&self, identity: &str) -> DatabaseResult<Option<AuthUser>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.unavailable {
                return Err(DatabaseError::Configuration("connection refused".to_string()));
            }
            // returns inactive users too; the resolver must drop them
            Ok(self.users.get(identity).cloned())
        }
    }

    fn user(email: &str, role: Option<&str>, permissions: &[&str], is_active: bool) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            role_id: role.map(|_| Uuid::new_v4()),
            role_name: role.map(str::to_string),
            is_active,
            permissions: permissions.iter().copied().collect::<PermissionSet>(),
        }
    }

    fn alice() -> AuthUser {
        user(
            "alice@example.com",
            Some("editor"),
            &["manage_pages", "view_pages"],
            true,
        )
    }

    async fn whoami(
        Extension(identity): Extension<UserIdentity>,
        user: Option<Extension<AuthUser>>,
    ) -> Json<Value> {
        Json(json!({
            "identity": identity.0,
            "role_name": user.and_then(|Extension(u)| u.role_name),
        }))
    }

    fn app(gate: Gate) -> Router {
        Router::new()
            .route("/protected", get(whoami))
            .route_layer(middleware::from_fn_with_state(gate, enforce))
    }

    async fn call(app: Router, identity: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri("/protected");
        if let Some(identity) = identity {
            builder = builder.header("x-user-id", identity);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_missing_identity_is_401_without_lookup() {
        let directory = FakeDirectory::with(vec![alice()]);
        let gate = Gate::require_permission(directory.clone(), Permission::ManagePages);

        let (status, body) = call(app(gate), None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");
        assert_eq!(directory.lookups(), 0);
    }

    #[tokio::test]
    async fn test_missing_identity_is_401_even_with_store_down() {
        let directory = FakeDirectory::unavailable();
        let gate = Gate::require_any_permission(directory.clone(), [Permission::ViewPages]);

        let (status, _) = call(app(gate), None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(directory.lookups(), 0);
    }

    #[tokio::test]
    async fn test_blank_identity_counts_as_missing() {
        let directory = FakeDirectory::with(vec![alice()]);
        let gate = Gate::require_permission(directory.clone(), Permission::ManagePages);

        let (status, _) = call(app(gate), Some("  ")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(directory.lookups(), 0);
    }

    #[tokio::test]
    async fn test_require_auth_admits_any_identity_without_lookup() {
        let directory = FakeDirectory::with(vec![]);
        let gate = Gate::require_auth(directory.clone());

        let (status, body) = call(app(gate), Some("stranger@example.com")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["identity"], "stranger@example.com");
        assert_eq!(body["role_name"], Value::Null);
        assert_eq!(directory.lookups(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_is_403() {
        let directory = FakeDirectory::with(vec![alice()]);
        let gate = Gate::require_permission(directory.clone(), Permission::ManagePages);

        let (status, body) = call(app(gate), Some("mallory@example.com")).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "User not found or inactive");
        assert_eq!(directory.lookups(), 1);
    }

    #[tokio::test]
    async fn test_inactive_user_is_403_whatever_the_role_grants() {
        let directory = FakeDirectory::with(vec![user(
            "bob@example.com",
            Some("admin"),
            &["manage_users"],
            false,
        )]);
        let gate = Gate::require_permission(directory, Permission::ManageUsers);

        let (status, body) = call(app(gate), Some("bob@example.com")).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "User not found or inactive");
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let directory = FakeDirectory::unavailable();
        let gate = Gate::require_permission(directory.clone(), Permission::ViewPages);

        let (status, body) = call(app(gate), Some("alice@example.com")).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "User not found or inactive");
        assert_eq!(directory.lookups(), 1);
    }

    #[tokio::test]
    async fn test_user_without_role_is_denied() {
        let directory = FakeDirectory::with(vec![user("carol@example.com", None, &[], true)]);
        let gate = Gate::require_any_permission(directory, Permission::ALL);

        let (status, body) = call(app(gate), Some("carol@example.com")).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Insufficient permissions");
    }

    #[tokio::test]
    async fn test_missing_permission_is_403_naming_it() {
        let directory = FakeDirectory::with(vec![alice()]);
        let gate = Gate::require_permission(directory, Permission::ManageUsers);

        let (status, body) = call(app(gate), Some("alice@example.com")).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Insufficient permissions");
        assert_eq!(body["required"], "manage_users");
    }

    #[tokio::test]
    async fn test_any_of_admits_and_attaches_resolved_user() {
        let directory = FakeDirectory::with(vec![alice()]);
        let gate = Gate::require_any_permission(
            directory.clone(),
            [Permission::ManagePages, Permission::ManageUsers],
        );

        let (status, body) = call(app(gate), Some("alice@example.com")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["identity"], "alice@example.com");
        assert_eq!(body["role_name"], "editor");
        assert_eq!(directory.lookups(), 1);
    }

    #[tokio::test]
    async fn test_any_of_failure_names_every_alternative() {
        let directory = FakeDirectory::with(vec![alice()]);
        let gate = Gate::require_any_permission(
            directory,
            [Permission::ManageRoles, Permission::ManageUsers],
        );

        let (status, body) = call(app(gate), Some("alice@example.com")).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["required"], json!(["manage_roles", "manage_users"]));
    }

    #[tokio::test]
    async fn test_empty_any_of_admits_nobody() {
        let all: Vec<&str> = Permission::ALL.iter().map(|p| p.as_str()).collect();
        let directory = FakeDirectory::with(vec![user("root@example.com", Some("admin"), &all, true)]);
        let gate = Gate::require_any_permission(directory, Vec::<Permission>::new());

        let (status, body) = call(app(gate), Some("root@example.com")).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["required"], json!([]));
    }

    #[tokio::test]
    async fn test_every_request_is_resolved_again() {
        let directory = FakeDirectory::with(vec![alice()]);
        let gate = Gate::require_permission(directory.clone(), Permission::ViewPages);
        let app = app(gate);

        for _ in 0..3 {
            let (status, _) = call(app.clone(), Some("alice@example.com")).await;
            assert_eq!(status, StatusCode::OK);
        }
        assert_eq!(directory.lookups(), 3);
    }

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        let peer = ConnectInfo(SocketAddr::from(([192, 168, 1, 20], 51000)));

        assert_eq!(client_ip(&headers, Some(&peer)), Some("192.168.1.20".to_string()));
        assert_eq!(client_ip(&headers, None), None);

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(&peer)), Some("203.0.113.9".to_string()));
    }
}
