// handlers/elevated/users.rs - /api/admin/users

use axum::{extract::State, Extension};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{PageQuery, Role, User};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::AccountService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    #[serde(default)]
    pub pending: bool,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

fn service(state: &AppState) -> AccountService {
    AccountService::new(state.store.clone(), state.config.security.clone())
}

/// GET /api/admin/users?pending=true
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UsersQuery>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Vec<User>> {
    let users = service(&state).list_users(query.pending, state.page(page)).await?;
    Ok(ApiResponse::success(users))
}

/// POST /api/admin/users/:id/approve
pub async fn approve(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<User> {
    Ok(ApiResponse::success(service(&state).approve(id).await?))
}

/// PUT /api/admin/users/:id/role - `{"role": "admin" | "clinician"}`
pub async fn set_role(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RoleRequest>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(service(&state).set_role(admin.id, id, request.role).await?))
}
