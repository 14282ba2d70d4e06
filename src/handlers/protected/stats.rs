// handlers/protected/stats.rs - GET /api/stats

use axum::{extract::State, Extension};

use crate::database::models::Stats;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// Dashboard counters; admins get global numbers, clinicians their own.
pub async fn stats(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Stats> {
    Ok(ApiResponse::success(state.store.stats(user.scope()).await?))
}
