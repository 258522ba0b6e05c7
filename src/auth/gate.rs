//! Request gate — runs once per inbound request, ahead of every handler.
//!
//! Resolves the authenticated principal from the session cookie (degrading
//! to anonymous on any verification failure) and enforces the configured
//! protected-route table. Page paths are redirected to `/`; `/api` paths get
//! a uniform 401 envelope that does not reveal whether the token was
//! missing, malformed, expired, or merely under-privileged.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::api::{ApiError, ApiResponse, AppState};
use crate::auth::cookies::AUTH_COOKIE;
use crate::auth::principal::Principal;
use crate::auth::role::Role;
use crate::config::ProtectedRoute;

/// Compiled protected-route table, built once at startup from config.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<(String, Role)>,
}

impl RouteTable {
    #[must_use]
    pub fn from_config(routes: &[ProtectedRoute]) -> Self {
        let rules = routes
            .iter()
            .map(|r| (r.path.clone(), r.min_role))
            .collect();
        Self { rules }
    }

    /// Minimum role required for `path`, or `None` when the path is public.
    /// A rule matches exactly or as a prefix at a `/` boundary; the first
    /// configured rule wins.
    #[must_use]
    pub fn required_role(&self, path: &str) -> Option<Role> {
        self.rules
            .iter()
            .find(|(rule, _)| {
                path == rule
                    || (path.len() > rule.len()
                        && path.starts_with(rule.as_str())
                        && path.as_bytes()[rule.len()] == b'/')
            })
            .map(|(_, role)| *role)
    }
}

/// Axum middleware: resolve the principal from the session cookie, attach
/// it to request extensions, and short-circuit requests that fail the
/// protected-route table before any handler runs.
pub async fn auth_gate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = resolve_principal(&state, &jar).await;

    if let Some(required) = state.routes().required_role(request.uri().path()) {
        let allowed = principal
            .as_ref()
            .is_some_and(|p| p.role.at_least(required));

        if !allowed {
            return deny(request.uri().path());
        }
    }

    if let Some(principal) = principal {
        request.extensions_mut().insert(principal);
    }

    next.run(request).await
}

/// Resolve the current principal from the `auth_token` cookie. Every
/// failure mode — absent cookie, failed verification, vanished user, store
/// outage — degrades to anonymous. The auth layer fails closed ("logged
/// out"), never open.
async fn resolve_principal(state: &AppState, jar: &CookieJar) -> Option<Principal> {
    let cookie = jar.get(AUTH_COOKIE)?;

    let Some(claims) = state.tokens().verify(cookie.value()) else {
        warn!("session token failed verification; continuing as anonymous");
        return None;
    };

    match state.store().get_user_by_id(claims.sub).await {
        Ok(Some(user)) => Some(Principal::from(user)),
        Ok(None) => {
            warn!(
                user_id = claims.sub,
                "token subject no longer exists; continuing as anonymous"
            );
            None
        }
        Err(e) => {
            warn!("user lookup failed during session resolution: {e}; continuing as anonymous");
            None
        }
    }
}

/// Uniform rejection: API paths get the 401 envelope, page paths a
/// 303 redirect to the public landing page.
fn deny(path: &str) -> Response {
    if path == "/api" || path.starts_with("/api/") {
        let body = ApiResponse::<()>::error("Unauthorized");
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    } else {
        Redirect::to("/").into_response()
    }
}

/// Extractor for handlers that require an authenticated principal. The
/// rejection is the same uniform 401 the gate produces.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Self)
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::from_config(&[
            ProtectedRoute {
                path: "/admin".to_string(),
                min_role: Role::Admin,
            },
            ProtectedRoute {
                path: "/reports".to_string(),
                min_role: Role::Manager,
            },
        ])
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(table().required_role("/admin"), Some(Role::Admin));
        assert_eq!(table().required_role("/reports"), Some(Role::Manager));
    }

    #[test]
    fn test_prefix_match_at_slash_boundary() {
        assert_eq!(table().required_role("/admin/users"), Some(Role::Admin));
        assert_eq!(table().required_role("/admin/"), Some(Role::Admin));
    }

    #[test]
    fn test_no_partial_segment_match() {
        // "/administrator" shares a prefix with "/admin" but is a different
        // path segment and stays public.
        assert_eq!(table().required_role("/administrator"), None);
    }

    #[test]
    fn test_unlisted_paths_are_public() {
        assert_eq!(table().required_role("/"), None);
        assert_eq!(table().required_role("/login"), None);
        assert_eq!(table().required_role("/api/users/me"), None);
    }

    #[test]
    fn test_first_rule_wins() {
        let table = RouteTable::from_config(&[
            ProtectedRoute {
                path: "/admin".to_string(),
                min_role: Role::Manager,
            },
            ProtectedRoute {
                path: "/admin".to_string(),
                min_role: Role::Admin,
            },
        ]);
        assert_eq!(table.required_role("/admin"), Some(Role::Manager));
    }
}
