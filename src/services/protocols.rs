use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::{NewProtocol, Page, Protocol, ProtocolFilter, ProtocolUpdate};
use crate::database::Store;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::movement::{plan_protocol, FieldErrors, ProtocolConfiguration, ProtocolPlan};

const MAX_NAME_LEN: usize = 200;
const DEFAULT_VERSION: &str = "1.0";

#[derive(Debug, Deserialize)]
pub struct CreateProtocolRequest {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub configuration: Value,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProtocolRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub configuration: Option<Value>,
    pub is_public: Option<bool>,
}

/// Result of a dry-run validation.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "FieldErrors::is_empty")]
    pub field_errors: FieldErrors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<ProtocolPlan>,
}

/// How `DELETE /api/protocols/:id` should treat the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Soft,
    Hard,
}

pub struct ProtocolService {
    store: Arc<dyn Store>,
}

impl ProtocolService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn can_view(user: &AuthUser, protocol: &Protocol) -> bool {
        user.is_admin() || protocol.is_public || protocol.created_by == user.id
    }

    fn can_manage(user: &AuthUser, protocol: &Protocol) -> bool {
        user.is_admin() || protocol.created_by == user.id
    }

    /// Visible protocol or 404; manage rights are checked separately so
    /// non-owners of public protocols get 403 instead.
    async fn visible(&self, user: &AuthUser, id: Uuid, include_deleted: bool) -> Result<Protocol, ApiError> {
        match self.store.get_protocol(id, include_deleted).await? {
            Some(protocol) if Self::can_view(user, &protocol) => Ok(protocol),
            _ => Err(ApiError::not_found("Protocol not found")),
        }
    }

    fn ensure_manage(user: &AuthUser, protocol: &Protocol) -> Result<(), ApiError> {
        if Self::can_manage(user, protocol) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only the protocol creator or an administrator may change it"))
        }
    }

    fn check_name(name: &str, errors: &mut FieldErrors) {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            errors.insert("name".to_string(), "is required".to_string());
        } else if trimmed.chars().count() > MAX_NAME_LEN {
            errors.insert("name".to_string(), format!("must be at most {} characters", MAX_NAME_LEN));
        }
    }

    fn parse_configuration(value: Value) -> Result<ProtocolConfiguration, ApiError> {
        ProtocolConfiguration::parse(value)
            .map_err(|errors| ApiError::unprocessable_entity("Invalid protocol configuration", errors))
    }

    pub async fn list(
        &self,
        user: &AuthUser,
        include_deleted: bool,
        page: Page,
    ) -> Result<Vec<Protocol>, ApiError> {
        let filter = ProtocolFilter {
            visible_to: if user.is_admin() { None } else { Some(user.id) },
            include_deleted,
        };
        Ok(self.store.list_protocols(filter, page).await?)
    }

    pub async fn get(&self, user: &AuthUser, id: Uuid, include_deleted: bool) -> Result<Protocol, ApiError> {
        self.visible(user, id, include_deleted).await
    }

    pub async fn create(&self, user: &AuthUser, request: CreateProtocolRequest) -> Result<Protocol, ApiError> {
        let mut errors = FieldErrors::new();
        Self::check_name(&request.name, &mut errors);
        if !errors.is_empty() {
            return Err(ApiError::validation_error("Invalid protocol", Some(errors)));
        }

        let configuration = Self::parse_configuration(request.configuration)?;
        let protocol = self
            .store
            .create_protocol(NewProtocol {
                name: request.name.trim().to_string(),
                description: request.description,
                version: request.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
                configuration,
                is_public: request.is_public,
                created_by: user.id,
            })
            .await?;

        tracing::info!("Protocol {} '{}' created by {}", protocol.id, protocol.name, user.email);
        Ok(protocol)
    }

    pub async fn update(
        &self,
        user: &AuthUser,
        id: Uuid,
        request: UpdateProtocolRequest,
    ) -> Result<Protocol, ApiError> {
        let protocol = self.visible(user, id, false).await?;
        Self::ensure_manage(user, &protocol)?;

        if let Some(name) = &request.name {
            let mut errors = FieldErrors::new();
            Self::check_name(name, &mut errors);
            if !errors.is_empty() {
                return Err(ApiError::validation_error("Invalid protocol", Some(errors)));
            }
        }

        let configuration = request.configuration.map(Self::parse_configuration).transpose()?;
        let update = ProtocolUpdate {
            name: request.name.map(|n| n.trim().to_string()),
            description: request.description,
            version: request.version,
            configuration,
            is_public: request.is_public,
        };
        Ok(self.store.update_protocol(id, update).await?)
    }

    pub async fn delete(&self, user: &AuthUser, id: Uuid, mode: DeleteMode) -> Result<Protocol, ApiError> {
        match mode {
            DeleteMode::Soft => {
                // Already soft-deleted rows are hidden, so a second delete is a 404.
                let protocol = self.visible(user, id, false).await?;
                Self::ensure_manage(user, &protocol)?;
                let deleted = self.store.set_protocol_deleted(id, true).await?;
                tracing::info!("Protocol {} soft-deleted by {}", id, user.email);
                Ok(deleted)
            }
            DeleteMode::Hard => {
                if !user.is_admin() {
                    return Err(ApiError::forbidden("Permanent deletion requires the administrator role"));
                }
                let protocol = self.visible(user, id, true).await?;
                let recordings = self.store.count_sessions_for_protocol(id).await?;
                if recordings > 0 {
                    return Err(ApiError::conflict(format!(
                        "Protocol is referenced by {} recording(s); soft delete it instead",
                        recordings
                    )));
                }
                self.store.delete_protocol(id).await?;
                tracing::warn!("Protocol {} permanently deleted by {}", id, user.email);
                Ok(protocol)
            }
        }
    }

    pub async fn restore(&self, user: &AuthUser, id: Uuid) -> Result<Protocol, ApiError> {
        let protocol = self.visible(user, id, true).await?;
        Self::ensure_manage(user, &protocol)?;
        if !protocol.is_deleted() {
            return Err(ApiError::conflict("Protocol is not deleted"));
        }
        Ok(self.store.set_protocol_deleted(id, false).await?)
    }

    pub async fn analysis_plan(&self, user: &AuthUser, id: Uuid) -> Result<ProtocolPlan, ApiError> {
        let protocol = self.visible(user, id, true).await?;
        Ok(plan_protocol(&protocol.configuration))
    }

    /// Dry run used by the protocol editor; never touches the store.
    pub fn validate(configuration: Value) -> ValidationReport {
        match ProtocolConfiguration::parse(configuration) {
            Ok(config) => ValidationReport {
                valid: true,
                field_errors: FieldErrors::new(),
                plan: Some(plan_protocol(&config)),
            },
            Err(field_errors) => ValidationReport {
                valid: false,
                field_errors,
                plan: None,
            },
        }
    }

    /// Protocol that a new recording may reference.
    pub async fn attachable(&self, user: &AuthUser, id: Uuid) -> Result<Protocol, ApiError> {
        let protocol = match self.store.get_protocol(id, true).await? {
            Some(protocol) if Self::can_view(user, &protocol) => protocol,
            _ => return Err(unattachable("unknown protocol")),
        };
        if protocol.is_deleted() {
            return Err(unattachable("protocol has been deleted"));
        }
        Ok(protocol)
    }
}

fn unattachable(reason: &str) -> ApiError {
    let mut errors = FieldErrors::new();
    errors.insert("protocol_id".to_string(), reason.to_string());
    ApiError::unprocessable_entity("Protocol cannot be used for new recordings", errors)
}
