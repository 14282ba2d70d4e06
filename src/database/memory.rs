//! In-process store used for local development and tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    normalize_email, ExperimentSession, NewPatient, NewProject, NewProtocol, NewSession, NewUser, Page, Patient,
    PatientSummary, PatientUpdate, Project, ProjectUpdate, Protocol, ProtocolFilter, ProtocolSummary,
    ProtocolUpdate, Role, Scope, SessionDetail, SessionStatus, Stats, User,
};
use super::store::Store;

#[derive(Default)]
struct Tables {
    // Insertion ordered; listings walk them newest first.
    users: Vec<User>,
    projects: Vec<Project>,
    patients: Vec<Patient>,
    protocols: Vec<Protocol>,
    sessions: Vec<ExperimentSession>,
}

impl Tables {
    fn user_mut(&mut self, id: Uuid) -> Result<&mut User, DatabaseError> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))
    }

    fn project_mut(&mut self, id: Uuid) -> Result<&mut Project, DatabaseError> {
        self.projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("project {}", id)))
    }

    fn patient_mut(&mut self, id: Uuid) -> Result<&mut Patient, DatabaseError> {
        self.patients
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("patient {}", id)))
    }

    fn protocol_mut(&mut self, id: Uuid) -> Result<&mut Protocol, DatabaseError> {
        self.protocols
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("protocol {}", id)))
    }

    fn live_project(&self, id: Uuid) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id && p.deleted_at.is_none())
    }

    /// Patient is live and so is its project.
    fn patient_visible(&self, patient: &Patient, scope: Scope) -> bool {
        if patient.deleted_at.is_some() {
            return false;
        }
        match self.live_project(patient.project_id) {
            Some(project) => scope.owner().map_or(true, |owner| project.owner_id == owner),
            None => false,
        }
    }

    fn protocol_visible(protocol: &Protocol, filter: ProtocolFilter) -> bool {
        if protocol.deleted_at.is_some() && !filter.include_deleted {
            return false;
        }
        match filter.visible_to {
            None => true,
            Some(user) => protocol.is_public || protocol.created_by == user,
        }
    }

    fn detail(&self, session: &ExperimentSession) -> Option<SessionDetail> {
        let patient = self.patients.iter().find(|p| p.id == session.patient_id)?;
        let protocol = session
            .protocol_id
            .and_then(|id| self.protocols.iter().find(|p| p.id == id))
            .map(ProtocolSummary::from);
        Some(SessionDetail {
            session: session.clone(),
            patient: PatientSummary::from(patient),
            protocol,
        })
    }
}

fn paginate<T: Clone>(items: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    items.skip(page.offset as usize).take(page.limit as usize).collect()
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        let email = normalize_email(&user.email);
        if tables.users.iter().any(|u| u.email == email) {
            return Err(DatabaseError::Conflict("users_email_key".to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            phone_number: user.phone_number,
            hospital_institute: user.hospital_institute,
            department: user.department,
            role: user.role,
            is_approved: user.is_approved,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let email = normalize_email(email);
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.email == email && u.deleted_at.is_none())
            .cloned())
    }

    async fn list_users(&self, pending_only: bool, page: Page) -> Result<Vec<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(paginate(
            tables
                .users
                .iter()
                .rev()
                .filter(|u| u.deleted_at.is_none() && (!pending_only || !u.is_approved))
                .cloned(),
            page,
        ))
    }

    async fn set_user_approval(&self, id: Uuid, approved: bool) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(id)?;
        user.is_approved = approved;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(id)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().filter(|u| u.deleted_at.is_none()).count() as i64)
    }

    async fn create_project(&self, project: NewProject) -> Result<Project, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == project.owner_id) {
            return Err(DatabaseError::Conflict("projects_owner_id_fkey violated".to_string()));
        }
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: project.name,
            description: project.description,
            owner_id: project.owner_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.projects.push(project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: Uuid, include_deleted: bool) -> Result<Option<Project>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .projects
            .iter()
            .find(|p| p.id == id && (include_deleted || p.deleted_at.is_none()))
            .cloned())
    }

    async fn list_projects(&self, scope: Scope, page: Page) -> Result<Vec<Project>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(paginate(
            tables
                .projects
                .iter()
                .rev()
                .filter(|p| p.deleted_at.is_none())
                .filter(|p| scope.owner().map_or(true, |owner| p.owner_id == owner))
                .cloned(),
            page,
        ))
    }

    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> Result<Project, DatabaseError> {
        let mut tables = self.tables.write().await;
        let project = tables.project_mut(id)?;
        if let Some(name) = update.name {
            project.name = name;
        }
        if let Some(description) = update.description {
            project.description = Some(description);
        }
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn set_project_deleted(&self, id: Uuid, deleted: bool) -> Result<Project, DatabaseError> {
        let mut tables = self.tables.write().await;
        let project = tables.project_mut(id)?;
        let now = Utc::now();
        project.deleted_at = deleted.then_some(now);
        project.updated_at = now;
        Ok(project.clone())
    }

    async fn create_patient(&self, patient: NewPatient) -> Result<Patient, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.projects.iter().any(|p| p.id == patient.project_id) {
            return Err(DatabaseError::Conflict("patients_project_id_fkey violated".to_string()));
        }
        if tables
            .patients
            .iter()
            .any(|p| p.project_id == patient.project_id && p.patient_code == patient.patient_code)
        {
            return Err(DatabaseError::Conflict("patients_project_code_key".to_string()));
        }
        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            project_id: patient.project_id,
            patient_code: patient.patient_code,
            name: patient.name,
            gender: patient.gender,
            date_of_birth: patient.date_of_birth,
            height_cm: patient.height_cm,
            weight_kg: patient.weight_kg,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.patients.push(patient.clone());
        Ok(patient)
    }

    async fn get_patient(&self, id: Uuid, include_deleted: bool) -> Result<Option<Patient>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .patients
            .iter()
            .find(|p| p.id == id && (include_deleted || tables.patient_visible(p, Scope::All)))
            .cloned())
    }

    async fn list_patients(
        &self,
        scope: Scope,
        project_id: Option<Uuid>,
        page: Page,
    ) -> Result<Vec<Patient>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(paginate(
            tables
                .patients
                .iter()
                .rev()
                .filter(|p| project_id.map_or(true, |id| p.project_id == id))
                .filter(|p| tables.patient_visible(p, scope))
                .cloned(),
            page,
        ))
    }

    async fn update_patient(&self, id: Uuid, update: PatientUpdate) -> Result<Patient, DatabaseError> {
        let mut tables = self.tables.write().await;
        let patient = tables.patient_mut(id)?;
        if let Some(name) = update.name {
            patient.name = name;
        }
        if let Some(gender) = update.gender {
            patient.gender = Some(gender);
        }
        if let Some(dob) = update.date_of_birth {
            patient.date_of_birth = Some(dob);
        }
        if let Some(height) = update.height_cm {
            patient.height_cm = Some(height);
        }
        if let Some(weight) = update.weight_kg {
            patient.weight_kg = Some(weight);
        }
        patient.updated_at = Utc::now();
        Ok(patient.clone())
    }

    async fn set_patient_deleted(&self, id: Uuid, deleted: bool) -> Result<Patient, DatabaseError> {
        let mut tables = self.tables.write().await;
        let patient = tables.patient_mut(id)?;
        let now = Utc::now();
        patient.deleted_at = deleted.then_some(now);
        patient.updated_at = now;
        Ok(patient.clone())
    }

    async fn create_session(&self, session: NewSession) -> Result<ExperimentSession, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.patients.iter().any(|p| p.id == session.patient_id) {
            return Err(DatabaseError::Conflict("experiment_sessions_patient_id_fkey violated".to_string()));
        }
        if let Some(protocol_id) = session.protocol_id {
            if !tables.protocols.iter().any(|p| p.id == protocol_id) {
                return Err(DatabaseError::Conflict(
                    "experiment_sessions_protocol_id_fkey violated".to_string(),
                ));
            }
        }
        let now = Utc::now();
        let session = ExperimentSession {
            id: Uuid::new_v4(),
            patient_id: session.patient_id,
            protocol_id: session.protocol_id,
            recorded_by: session.recorded_by,
            status: SessionStatus::Uploaded,
            video_path: session.video_path,
            keypoints_path: session.keypoints_path,
            video_sha256: session.video_sha256,
            keypoints_sha256: session.keypoints_sha256,
            notes: session.notes,
            created_at: now,
            updated_at: now,
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<SessionDetail>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| tables.detail(s)))
    }

    async fn list_sessions_for_patient(
        &self,
        patient_id: Uuid,
        page: Page,
    ) -> Result<Vec<SessionDetail>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(paginate(
            tables
                .sessions
                .iter()
                .rev()
                .filter(|s| s.patient_id == patient_id)
                .filter_map(|s| tables.detail(s)),
            page,
        ))
    }

    async fn update_session_status(
        &self,
        id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<ExperimentSession, DatabaseError> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("session {}", id)))?;
        if session.status != from {
            return Err(DatabaseError::Conflict(format!(
                "session status changed to '{}' concurrently",
                session.status
            )));
        }
        session.status = to;
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    async fn count_sessions_for_protocol(&self, protocol_id: Uuid) -> Result<i64, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .iter()
            .filter(|s| s.protocol_id == Some(protocol_id))
            .count() as i64)
    }

    async fn create_protocol(&self, protocol: NewProtocol) -> Result<Protocol, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let protocol = Protocol {
            id: Uuid::new_v4(),
            name: protocol.name,
            description: protocol.description,
            version: protocol.version,
            configuration: protocol.configuration,
            is_public: protocol.is_public,
            created_by: protocol.created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.protocols.push(protocol.clone());
        Ok(protocol)
    }

    async fn get_protocol(&self, id: Uuid, include_deleted: bool) -> Result<Option<Protocol>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .protocols
            .iter()
            .find(|p| p.id == id && (include_deleted || p.deleted_at.is_none()))
            .cloned())
    }

    async fn list_protocols(&self, filter: ProtocolFilter, page: Page) -> Result<Vec<Protocol>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(paginate(
            tables
                .protocols
                .iter()
                .rev()
                .filter(|p| Tables::protocol_visible(p, filter))
                .cloned(),
            page,
        ))
    }

    async fn update_protocol(&self, id: Uuid, update: ProtocolUpdate) -> Result<Protocol, DatabaseError> {
        let mut tables = self.tables.write().await;
        let protocol = tables.protocol_mut(id)?;
        if let Some(name) = update.name {
            protocol.name = name;
        }
        if let Some(description) = update.description {
            protocol.description = Some(description);
        }
        if let Some(version) = update.version {
            protocol.version = version;
        }
        if let Some(configuration) = update.configuration {
            protocol.configuration = configuration;
        }
        if let Some(is_public) = update.is_public {
            protocol.is_public = is_public;
        }
        protocol.updated_at = Utc::now();
        Ok(protocol.clone())
    }

    async fn set_protocol_deleted(&self, id: Uuid, deleted: bool) -> Result<Protocol, DatabaseError> {
        let mut tables = self.tables.write().await;
        let protocol = tables.protocol_mut(id)?;
        let now = Utc::now();
        protocol.deleted_at = deleted.then_some(now);
        protocol.updated_at = now;
        Ok(protocol.clone())
    }

    async fn delete_protocol(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.sessions.iter().any(|s| s.protocol_id == Some(id)) {
            return Err(DatabaseError::Conflict(
                "experiment_sessions_protocol_id_fkey violated".to_string(),
            ));
        }
        let before = tables.protocols.len();
        tables.protocols.retain(|p| p.id != id);
        if tables.protocols.len() == before {
            return Err(DatabaseError::NotFound(format!("protocol {}", id)));
        }
        Ok(())
    }

    async fn stats(&self, scope: Scope) -> Result<Stats, DatabaseError> {
        let tables = self.tables.read().await;

        let projects = tables
            .projects
            .iter()
            .filter(|p| p.deleted_at.is_none())
            .filter(|p| scope.owner().map_or(true, |owner| p.owner_id == owner))
            .count() as i64;

        let patient_ids: HashSet<Uuid> = tables
            .patients
            .iter()
            .filter(|p| tables.patient_visible(p, scope))
            .map(|p| p.id)
            .collect();

        let mut sessions_by_status: BTreeMap<String, i64> = SessionStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut sessions = 0;
        for session in tables.sessions.iter().filter(|s| patient_ids.contains(&s.patient_id)) {
            sessions += 1;
            *sessions_by_status.entry(session.status.as_str().to_string()).or_default() += 1;
        }

        let protocol_filter = ProtocolFilter {
            visible_to: scope.owner(),
            include_deleted: false,
        };
        let protocols = tables
            .protocols
            .iter()
            .filter(|p| Tables::protocol_visible(p, protocol_filter))
            .count() as i64;

        let pending_users = match scope {
            Scope::All => Some(
                tables
                    .users
                    .iter()
                    .filter(|u| u.deleted_at.is_none() && !u.is_approved)
                    .count() as i64,
            ),
            Scope::Owner(_) => None,
        };

        Ok(Stats {
            projects,
            patients: patient_ids.len() as i64,
            sessions,
            protocols,
            sessions_by_status,
            pending_users,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::{Freestyle, MovementConfig, ProtocolConfiguration};

    const PAGE: Page = Page { limit: 100, offset: 0 };

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            full_name: "Test User".to_string(),
            phone_number: None,
            hospital_institute: None,
            department: None,
            role,
            is_approved: true,
        }
    }

    fn configuration() -> ProtocolConfiguration {
        ProtocolConfiguration {
            movements: vec![MovementConfig::Freestyle(Freestyle {
                duration_seconds: 30,
                description: None,
            })],
            instructions: None,
            analysis_outputs: Default::default(),
        }
    }

    async fn seed(store: &MemoryStore) -> (User, Project, Patient, Protocol) {
        let user = store.create_user(new_user("owner@clinic.org", Role::Clinician)).await.unwrap();
        let project = store
            .create_project(NewProject {
                name: "Tremor study".into(),
                description: None,
                owner_id: user.id,
            })
            .await
            .unwrap();
        let patient = store
            .create_patient(NewPatient {
                project_id: project.id,
                patient_code: "P-001".into(),
                name: "Jane".into(),
                gender: None,
                date_of_birth: None,
                height_cm: None,
                weight_kg: None,
            })
            .await
            .unwrap();
        let protocol = store
            .create_protocol(NewProtocol {
                name: "Baseline".into(),
                description: None,
                version: "1.0".into(),
                configuration: configuration(),
                is_public: false,
                created_by: user.id,
            })
            .await
            .unwrap();
        (user, project, patient, protocol)
    }

    #[tokio::test]
    async fn duplicate_emails_conflict_case_insensitively() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@b.org", Role::Admin)).await.unwrap();
        let err = store.create_user(new_user(" A@B.org", Role::Admin)).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
        assert!(store.find_user_by_email("A@b.ORG").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_a_project_hides_its_patients() {
        let store = MemoryStore::new();
        let (user, project, patient, _) = seed(&store).await;

        assert_eq!(store.list_patients(Scope::Owner(user.id), None, PAGE).await.unwrap().len(), 1);
        store.set_project_deleted(project.id, true).await.unwrap();
        assert!(store.list_patients(Scope::Owner(user.id), None, PAGE).await.unwrap().is_empty());
        assert!(store.get_patient(patient.id, false).await.unwrap().is_none());
        assert!(store.get_patient(patient.id, true).await.unwrap().is_some());

        store.set_project_deleted(project.id, false).await.unwrap();
        assert!(store.get_patient(patient.id, false).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn session_detail_embeds_soft_deleted_protocol() {
        let store = MemoryStore::new();
        let (user, _, patient, protocol) = seed(&store).await;
        let session = store
            .create_session(NewSession {
                patient_id: patient.id,
                protocol_id: Some(protocol.id),
                recorded_by: user.id,
                video_path: None,
                keypoints_path: None,
                video_sha256: None,
                keypoints_sha256: None,
                notes: None,
            })
            .await
            .unwrap();

        store.set_protocol_deleted(protocol.id, true).await.unwrap();
        let detail = store.get_session(session.id).await.unwrap().unwrap();
        let summary = detail.protocol.expect("protocol embedded");
        assert!(summary.deleted);
        assert_eq!(detail.patient.patient_code, "P-001");

        let err = store.delete_protocol(protocol.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn status_update_is_compare_and_set() {
        let store = MemoryStore::new();
        let (user, _, patient, _) = seed(&store).await;
        let session = store
            .create_session(NewSession {
                patient_id: patient.id,
                protocol_id: None,
                recorded_by: user.id,
                video_path: None,
                keypoints_path: None,
                video_sha256: None,
                keypoints_sha256: None,
                notes: None,
            })
            .await
            .unwrap();

        store
            .update_session_status(session.id, SessionStatus::Uploaded, SessionStatus::Processing)
            .await
            .unwrap();
        let err = store
            .update_session_status(session.id, SessionStatus::Uploaded, SessionStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn stats_are_scoped_to_owner() {
        let store = MemoryStore::new();
        let (user, _, _, _) = seed(&store).await;
        let other = store.create_user(new_user("other@clinic.org", Role::Clinician)).await.unwrap();
        store
            .create_project(NewProject {
                name: "Other".into(),
                description: None,
                owner_id: other.id,
            })
            .await
            .unwrap();

        let mine = store.stats(Scope::Owner(user.id)).await.unwrap();
        assert_eq!(mine.projects, 1);
        assert_eq!(mine.patients, 1);
        assert_eq!(mine.protocols, 1);
        assert_eq!(mine.pending_users, None);

        let theirs = store.stats(Scope::Owner(other.id)).await.unwrap();
        assert_eq!(theirs.projects, 1);
        assert_eq!(theirs.protocols, 0);

        let all = store.stats(Scope::All).await.unwrap();
        assert_eq!(all.projects, 2);
        assert_eq!(all.sessions_by_status.get("uploaded"), Some(&0));
        assert_eq!(all.pending_users, Some(0));
    }
}
