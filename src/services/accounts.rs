use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{generate_jwt, hash_password, verify_password, Claims};
use crate::config::SecurityConfig;
use crate::database::models::{normalize_email, NewUser, Page, Role, User};
use crate::database::{DatabaseError, Store};
use crate::error::ApiError;
use crate::movement::FieldErrors;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub hospital_institute: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Seconds
    pub expires_in: u64,
    pub user: User,
}

pub fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

pub struct AccountService {
    store: Arc<dyn Store>,
    security: SecurityConfig,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    /// New accounts are clinicians waiting for an administrator.
    pub async fn register(&self, request: RegisterRequest) -> Result<User, ApiError> {
        let email = normalize_email(&request.email);
        let mut errors = FieldErrors::new();
        if !looks_like_email(&email) {
            errors.insert("email".to_string(), "must be a valid email address".to_string());
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            errors.insert(
                "password".to_string(),
                format!("must be at least {} characters", MIN_PASSWORD_LEN),
            );
        }
        if request.full_name.trim().is_empty() {
            errors.insert("full_name".to_string(), "is required".to_string());
        }
        if !errors.is_empty() {
            return Err(ApiError::validation_error("Invalid registration", Some(errors)));
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ApiError::conflict("Email is already registered"));
        }

        let password_hash = hash_password(&request.password, self.security.bcrypt_cost)
            .await
            .map_err(|e| {
                tracing::error!("{}", e);
                ApiError::internal_server_error("Failed to process password")
            })?;

        let user = self
            .store
            .create_user(NewUser {
                email,
                password_hash,
                full_name: request.full_name.trim().to_string(),
                phone_number: request.phone_number,
                hospital_institute: request.hospital_institute,
                department: request.department,
                role: Role::Clinician,
                is_approved: false,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => ApiError::conflict("Email is already registered"),
                other => other.into(),
            })?;

        tracing::info!("Registered {} (pending approval)", user.email);
        Ok(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ApiError> {
        let invalid = || ApiError::unauthorized("Invalid email or password");

        let user = self
            .store
            .find_user_by_email(&request.email)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&request.password, &user.password_hash).await {
            tracing::warn!("Failed login for {}", user.email);
            return Err(invalid());
        }
        if !user.is_approved {
            return Err(ApiError::forbidden("Account is waiting for administrator approval"));
        }

        let claims = Claims::for_user(&user, self.security.jwt_expiry_hours);
        let token = generate_jwt(&claims, &self.security).map_err(|e| {
            tracing::error!("{}", e);
            ApiError::internal_server_error("Failed to issue token")
        })?;

        tracing::info!("User {} logged in", user.email);
        Ok(LoginResponse {
            token,
            expires_in: self.security.jwt_expiry_hours * 3600,
            user,
        })
    }

    pub async fn list_users(&self, pending_only: bool, page: Page) -> Result<Vec<User>, ApiError> {
        Ok(self.store.list_users(pending_only, page).await?)
    }

    pub async fn approve(&self, id: Uuid) -> Result<User, ApiError> {
        let user = self
            .store
            .get_user(id)
            .await?
            .filter(|u| u.deleted_at.is_none())
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        if user.is_approved {
            return Ok(user);
        }
        let user = self.store.set_user_approval(id, true).await?;
        tracing::info!("Approved {}", user.email);
        Ok(user)
    }

    pub async fn set_role(&self, acting: Uuid, id: Uuid, role: Role) -> Result<User, ApiError> {
        if acting == id && role != Role::Admin {
            return Err(ApiError::conflict("Administrators cannot demote themselves"));
        }
        self.store
            .get_user(id)
            .await?
            .filter(|u| u.deleted_at.is_none())
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        let user = self.store.set_user_role(id, role).await?;
        tracing::info!("Role of {} set to {}", user.email, role);
        Ok(user)
    }
}
