// handlers/protected/auth.rs - GET /api/auth/whoami

use axum::{extract::State, Extension};

use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// Current user as stored, not as encoded in the token.
pub async fn whoami(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<User> {
    let user = state
        .store
        .get_user(user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(user))
}
