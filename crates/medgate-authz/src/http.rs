//! Axum integration.
//!
//! The identity provider (session or token middleware, outside this crate)
//! authenticates the caller and inserts an [`Identity`] into the request
//! extensions. This module reads it back and enforces module access:
//!
//! ```ignore
//! use axum::{Router, middleware, routing::get};
//! use medgate_authz::http::{CurrentIdentity, RouteAccess, require_route_access};
//!
//! async fn list_patients(CurrentIdentity(identity): CurrentIdentity) -> String {
//!     format!("hello {}", identity.user_id)
//! }
//!
//! let patients = Router::new()
//!     .route("/patients", get(list_patients))
//!     .route_layer(middleware::from_fn_with_state(
//!         RouteAccess::new(store.clone(), "patients"),
//!         require_route_access,
//!     ));
//! ```
//!
//! Row-level checks stay in the handlers, which load the row and call
//! [`crate::guard::enforce`].

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::AuthzResult;
use crate::context::Identity;
use crate::engine::PolicyEngine;
use crate::error::AuthzError;
use crate::reload::PolicyStore;
use crate::types::Action;

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let (status, code, message) = error_details(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "Authorization subsystem failure");
        }
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

/// Returns (HTTP status, error code, message).
fn error_details(error: &AuthzError) -> (StatusCode, String, String) {
    match error {
        AuthzError::Unauthenticated { message } => (
            StatusCode::UNAUTHORIZED,
            "unauthenticated".to_string(),
            message.clone(),
        ),
        AuthzError::Forbidden { code, message } => {
            (StatusCode::FORBIDDEN, code.clone(), message.clone())
        }
        // Configuration details are not exposed to clients.
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "server-error".to_string(),
            "Access policy is unavailable".to_string(),
        ),
    }
}

// =============================================================================
// Identity Extractor
// =============================================================================

/// The authenticated caller, as attached by the identity provider.
///
/// Rejects with 401 when no [`Identity`] extension is present.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthzError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                tracing::debug!(path = %parts.uri.path(), "Request without identity");
                AuthzError::unauthenticated("Authentication required")
            })
    }
}

// =============================================================================
// Route Access Middleware
// =============================================================================

/// State for [`require_route_access`]: the live policy and the module a
/// group of routes belongs to.
#[derive(Debug, Clone)]
pub struct RouteAccess {
    store: Arc<PolicyStore>,
    module: Arc<str>,
}

impl RouteAccess {
    #[must_use]
    pub fn new(store: Arc<PolicyStore>, module: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            module: module.into(),
        }
    }

    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }
}

/// Middleware rejecting callers with no access to the route's module.
///
/// Each method needs some scope for the action it maps to (GET and HEAD
/// read, POST create, PUT and PATCH update, DELETE delete). Methods with no
/// CRUD mapping are rejected. Ownership and predicates are left to the
/// handler.
pub async fn require_route_access(
    State(access): State<RouteAccess>,
    request: Request,
    next: Next,
) -> Result<Response, AuthzError> {
    let engine = access.store.engine();
    check_route(
        &engine,
        request.extensions().get::<Identity>(),
        access.module(),
        request.method(),
    )?;
    Ok(next.run(request).await)
}

fn check_route(
    engine: &PolicyEngine,
    identity: Option<&Identity>,
    module: &str,
    method: &Method,
) -> AuthzResult<()> {
    let identity = identity.ok_or_else(|| AuthzError::unauthenticated("Authentication required"))?;
    let Some(action) = Action::from_http_method(method.as_str()) else {
        tracing::debug!(
            role = %identity.role,
            user_id = identity.user_id,
            module,
            %method,
            "Route access denied: unmapped method"
        );
        return Err(AuthzError::forbidden(
            "route-forbidden",
            format!("method {method} is not allowed in module `{module}`"),
        ));
    };

    if engine.scope(identity.role, module, action).grants_something() {
        return Ok(());
    }

    tracing::debug!(
        role = %identity.role,
        user_id = identity.user_id,
        module,
        %action,
        "Route access denied"
    );
    Err(AuthzError::forbidden(
        "route-forbidden",
        format!("`{}` may not {action} in module `{module}`", identity.role),
    ))
}
