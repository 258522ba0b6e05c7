use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::users::UserDto;
use super::{ApiError, ApiResponse, AppState};
use crate::auth::cookies;
use crate::auth::gate::CurrentUser;
use crate::auth::principal::Principal;
use crate::auth::role::Role;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub username: String,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
/// Verify credentials and set the session cookie. Unknown usernames and
/// wrong passwords produce the same response.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let is_valid = state
        .store()
        .verify_user_password(&payload.username, &payload.password)
        .await
        .map_err(|e| ApiError::internal(format!("Authentication error: {e}")))?;

    if !is_valid {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let user = state
        .store()
        .get_user_by_username(&payload.username)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get user: {e}")))?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let token = state
        .tokens()
        .issue(user.id)
        .map_err(|e| ApiError::internal(format!("Failed to issue session token: {e}")))?;

    let cookie = cookies::auth_cookie(
        &token,
        state.tokens().ttl_seconds(),
        state.config().server.secure_cookies,
    );

    tracing::info!("Login succeeded for user: {}", user.username);

    Ok((
        jar.add(cookie),
        Json(ApiResponse::success(SessionResponse {
            username: user.username,
            role: user.role,
        })),
    ))
}

/// POST /api/auth/logout
/// Clear the session cookie. The token itself is stateless, so clearing the
/// cookie is the whole operation.
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let cookie = cookies::clear_auth_cookie(state.config().server.secure_cookies);

    (
        jar.add(cookie),
        Json(ApiResponse::success(MessageResponse {
            message: "Logged out".to_string(),
        })),
    )
}

/// POST /api/auth/signup
/// Self-registration with the minimal role. Role and team assignment are
/// granted later by an admin.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }

    let existing = state
        .store()
        .get_user_by_username(&payload.username)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to check username: {e}")))?;

    if existing.is_some() {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }

    let user = state
        .store()
        .create_user(
            &payload.username,
            &payload.password,
            Role::User,
            &state.config().security,
        )
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create user: {e}")))?;

    tracing::info!("User registered: {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserDto::from(user))),
    ))
}

/// PUT /api/auth/password
/// Change password (requires current password verification)
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if payload.new_password.len() < 8 {
        return Err(ApiError::validation(
            "New password must be at least 8 characters",
        ));
    }

    if payload.current_password == payload.new_password {
        return Err(ApiError::validation(
            "New password must be different from current password",
        ));
    }

    let is_valid = state
        .store()
        .verify_user_password(&principal.username, &payload.current_password)
        .await
        .map_err(|e| ApiError::internal(format!("Password verification error: {e}")))?;

    if !is_valid {
        return Err(ApiError::validation("Current password is incorrect"));
    }

    state
        .store()
        .update_user_password(
            &principal.username,
            &payload.new_password,
            &state.config().security,
        )
        .await
        .map_err(|e| ApiError::internal(format!("Failed to update password: {e}")))?;

    tracing::info!("Password changed for user: {}", principal.username);

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password updated successfully".to_string(),
    })))
}

/// GET /api/users/me
/// The authenticated principal, resolved fresh for this request.
pub async fn me(CurrentUser(principal): CurrentUser) -> Json<ApiResponse<Principal>> {
    Json(ApiResponse::success(principal))
}
