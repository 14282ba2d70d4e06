// handlers/public/auth.rs - token acquisition and self registration

use axum::extract::State;
use serde_json::{json, Value};

use crate::extract::ApiJson;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::accounts::{LoginRequest, LoginResponse, RegisterRequest};
use crate::services::AccountService;
use crate::state::AppState;

/// POST /api/auth/register - create a clinician account pending approval
///
/// ```json
/// { "email": "...", "password": "...", "full_name": "...",
///   "phone_number": "?", "hospital_institute": "?", "department": "?" }
/// ```
pub async fn register(State(state): State<AppState>, ApiJson(request): ApiJson<RegisterRequest>) -> ApiResult<Value> {
    let service = AccountService::new(state.store.clone(), state.config.security.clone());
    let user = service.register(request).await?;
    Ok(ApiResponse::created(json!({
        "message": "Waiting approval from an administrator",
        "user": user
    })))
}

/// POST /api/auth/login - exchange email and password for a JWT
///
/// 401 for bad credentials, 403 while the account waits for approval.
pub async fn login(State(state): State<AppState>, ApiJson(request): ApiJson<LoginRequest>) -> ApiResult<LoginResponse> {
    let service = AccountService::new(state.store.clone(), state.config.security.clone());
    Ok(ApiResponse::success(service.login(request).await?))
}
