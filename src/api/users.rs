use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::auth::gate::CurrentUser;
use crate::auth::principal::Principal;
use crate::auth::role::Role;
use crate::db::User;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub team_id: Option<i32>,
    pub team_member_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            team_id: user.team_id,
            team_member_id: user.team_member_id,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub role: Role,
    pub team_id: Option<i32>,
    pub team_member_id: Option<i32>,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Per-action role check. Handlers re-verify even when the gate screened
/// the path, since the route table and handler requirements are configured
/// independently.
fn require_role(principal: &Principal, required: Role) -> Result<(), ApiError> {
    if principal.role.at_least(required) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Unauthorized".to_string()))
    }
}

/// GET /api/users
/// List all accounts (admin only). Password hashes never appear here; the
/// repository does not expose them.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    require_role(&principal, Role::Admin)?;

    let users = state
        .store()
        .list_users()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to list users: {e}")))?;

    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserDto::from).collect(),
    )))
}

/// PUT /api/users/{id}
/// Update role and team assignment (admin only). Takes effect on the
/// target's next request, since tokens carry only the user id.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    require_role(&principal, Role::Admin)?;

    let updated = state
        .store()
        .update_user_assignment(id, payload.role, payload.team_id, payload.team_member_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to update user: {e}")))?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    tracing::info!("User {} assignment updated to {}", id, updated.role);

    Ok(Json(ApiResponse::success(UserDto::from(updated))))
}

/// DELETE /api/users/{id}
/// Remove an account (admin only).
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    require_role(&principal, Role::Admin)?;

    let deleted = state
        .store()
        .delete_user(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to delete user: {e}")))?;

    if !deleted {
        return Err(ApiError::not_found("User", id));
    }

    Ok(Json(ApiResponse::success(DeletedResponse { deleted })))
}
