use async_trait::async_trait;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    ExperimentSession, NewPatient, NewProject, NewProtocol, NewSession, NewUser, Page, Patient, PatientUpdate,
    Project, ProjectUpdate, Protocol, ProtocolFilter, ProtocolUpdate, Role, Scope, SessionDetail, SessionStatus,
    Stats, User,
};

/// Persistence boundary for the API.
///
/// Reads return `Ok(None)` for missing rows; writes addressed at a missing row
/// return `DatabaseError::NotFound`. Soft-deleted rows are hidden unless
/// `include_deleted` is passed.
#[async_trait]
pub trait Store: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<(), DatabaseError>;

    // Users
    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;
    async fn list_users(&self, pending_only: bool, page: Page) -> Result<Vec<User>, DatabaseError>;
    async fn set_user_approval(&self, id: Uuid, approved: bool) -> Result<User, DatabaseError>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<User, DatabaseError>;
    async fn count_users(&self) -> Result<i64, DatabaseError>;

    // Projects
    async fn create_project(&self, project: NewProject) -> Result<Project, DatabaseError>;
    async fn get_project(&self, id: Uuid, include_deleted: bool) -> Result<Option<Project>, DatabaseError>;
    async fn list_projects(&self, scope: Scope, page: Page) -> Result<Vec<Project>, DatabaseError>;
    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> Result<Project, DatabaseError>;
    async fn set_project_deleted(&self, id: Uuid, deleted: bool) -> Result<Project, DatabaseError>;

    // Patients
    async fn create_patient(&self, patient: NewPatient) -> Result<Patient, DatabaseError>;
    async fn get_patient(&self, id: Uuid, include_deleted: bool) -> Result<Option<Patient>, DatabaseError>;
    async fn list_patients(
        &self,
        scope: Scope,
        project_id: Option<Uuid>,
        page: Page,
    ) -> Result<Vec<Patient>, DatabaseError>;
    async fn update_patient(&self, id: Uuid, update: PatientUpdate) -> Result<Patient, DatabaseError>;
    async fn set_patient_deleted(&self, id: Uuid, deleted: bool) -> Result<Patient, DatabaseError>;

    // Recordings
    async fn create_session(&self, session: NewSession) -> Result<ExperimentSession, DatabaseError>;
    async fn get_session(&self, id: Uuid) -> Result<Option<SessionDetail>, DatabaseError>;
    async fn list_sessions_for_patient(&self, patient_id: Uuid, page: Page)
        -> Result<Vec<SessionDetail>, DatabaseError>;
    /// Compare-and-set: fails with `Conflict` when the stored status is no longer `from`.
    async fn update_session_status(
        &self,
        id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<ExperimentSession, DatabaseError>;
    async fn count_sessions_for_protocol(&self, protocol_id: Uuid) -> Result<i64, DatabaseError>;

    // Protocols
    async fn create_protocol(&self, protocol: NewProtocol) -> Result<Protocol, DatabaseError>;
    async fn get_protocol(&self, id: Uuid, include_deleted: bool) -> Result<Option<Protocol>, DatabaseError>;
    async fn list_protocols(&self, filter: ProtocolFilter, page: Page) -> Result<Vec<Protocol>, DatabaseError>;
    async fn update_protocol(&self, id: Uuid, update: ProtocolUpdate) -> Result<Protocol, DatabaseError>;
    async fn set_protocol_deleted(&self, id: Uuid, deleted: bool) -> Result<Protocol, DatabaseError>;
    /// Removes the row; fails with `Conflict` while recordings still reference it.
    async fn delete_protocol(&self, id: Uuid) -> Result<(), DatabaseError>;

    async fn stats(&self, scope: Scope) -> Result<Stats, DatabaseError>;
}
