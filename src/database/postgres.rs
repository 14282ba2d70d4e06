use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

use super::manager::{DatabaseError, DatabaseManager};
use super::models::{
    normalize_email, ExperimentSession, NewPatient, NewProject, NewProtocol, NewSession, NewUser, Page, Patient,
    PatientSummary, PatientUpdate, Project, ProjectUpdate, Protocol, ProtocolFilter, ProtocolSummary,
    ProtocolUpdate, Role, Scope, SessionDetail, SessionStatus, Stats, User,
};
use super::store::Store;
use crate::movement::ProtocolConfiguration;

const USER_COLUMNS: &str = "id, email, password_hash, full_name, phone_number, hospital_institute, department, \
     role, is_approved, created_at, updated_at, deleted_at";

const PROJECT_COLUMNS: &str = "id, name, description, owner_id, created_at, updated_at, deleted_at";

const PATIENT_COLUMNS: &str = "p.id, p.project_id, p.patient_code, p.name, p.gender, p.date_of_birth, \
     p.height_cm, p.weight_kg, p.created_at, p.updated_at, p.deleted_at";

const PROTOCOL_COLUMNS: &str =
    "id, name, description, version, configuration, is_public, created_by, created_at, updated_at, deleted_at";

const SESSION_COLUMNS: &str = "id, patient_id, protocol_id, recorded_by, status, video_path, keypoints_path, \
     video_sha256, keypoints_sha256, notes, created_at, updated_at";

const SESSION_DETAIL_SELECT: &str = "SELECT s.id, s.patient_id, s.protocol_id, s.recorded_by, s.status, \
     s.video_path, s.keypoints_path, s.video_sha256, s.keypoints_sha256, s.notes, s.created_at, s.updated_at, \
     pa.project_id, pa.patient_code, pa.name AS patient_name, \
     pr.name AS protocol_name, pr.version AS protocol_version, pr.deleted_at AS protocol_deleted_at \
     FROM experiment_sessions s \
     JOIN patients pa ON pa.id = s.patient_id \
     LEFT JOIN protocols pr ON pr.id = s.protocol_id";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    full_name: String,
    phone_number: Option<String>,
    hospital_institute: Option<String>,
    department: Option<String>,
    role: String,
    is_approved: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            phone_number: row.phone_number,
            hospital_institute: row.hospital_institute,
            department: row.department,
            role: Role::from_stored(&row.role),
            is_approved: row.is_approved,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(FromRow)]
struct ProtocolRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    version: String,
    configuration: Json<ProtocolConfiguration>,
    is_public: bool,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ProtocolRow> for Protocol {
    fn from(row: ProtocolRow) -> Self {
        Protocol {
            id: row.id,
            name: row.name,
            description: row.description,
            version: row.version,
            configuration: row.configuration.0,
            is_public: row.is_public,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    patient_id: Uuid,
    protocol_id: Option<Uuid>,
    recorded_by: Uuid,
    status: String,
    video_path: Option<String>,
    keypoints_path: Option<String>,
    video_sha256: Option<String>,
    keypoints_sha256: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for ExperimentSession {
    type Error = DatabaseError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(ExperimentSession {
            id: row.id,
            patient_id: row.patient_id,
            protocol_id: row.protocol_id,
            recorded_by: row.recorded_by,
            status: row.status.parse().map_err(DatabaseError::QueryError)?,
            video_path: row.video_path,
            keypoints_path: row.keypoints_path,
            video_sha256: row.video_sha256,
            keypoints_sha256: row.keypoints_sha256,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SessionDetailRow {
    #[sqlx(flatten)]
    session: SessionRow,
    project_id: Uuid,
    patient_code: String,
    patient_name: String,
    protocol_name: Option<String>,
    protocol_version: Option<String>,
    protocol_deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<SessionDetailRow> for SessionDetail {
    type Error = DatabaseError;

    fn try_from(row: SessionDetailRow) -> Result<Self, Self::Error> {
        let session = ExperimentSession::try_from(row.session)?;
        let patient = PatientSummary {
            id: session.patient_id,
            project_id: row.project_id,
            patient_code: row.patient_code,
            name: row.patient_name,
        };
        let protocol = match (session.protocol_id, row.protocol_name, row.protocol_version) {
            (Some(id), Some(name), Some(version)) => Some(ProtocolSummary {
                id,
                name,
                version,
                deleted: row.protocol_deleted_at.is_some(),
            }),
            _ => None,
        };
        Ok(SessionDetail {
            session,
            patient,
            protocol,
        })
    }
}

/// Postgres-backed store.
pub struct PgStore {
    pool: PgPool,
    slow_query: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, slow_query_threshold_ms: u64) -> Self {
        Self {
            pool,
            slow_query: Duration::from_millis(slow_query_threshold_ms),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn timed<T, F>(&self, label: &'static str, fut: F) -> Result<T, DatabaseError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        let started = Instant::now();
        let result = fut.await;
        let elapsed = started.elapsed();
        if elapsed > self.slow_query {
            warn!("Slow query {} took {}ms", label, elapsed.as_millis());
        }
        result.map_err(DatabaseError::from)
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, full_name, phone_number, hospital_institute, department, role, is_approved) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            USER_COLUMNS
        );
        let row = self
            .timed(
                "create_user",
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(Uuid::new_v4())
                    .bind(normalize_email(&user.email))
                    .bind(&user.password_hash)
                    .bind(&user.full_name)
                    .bind(&user.phone_number)
                    .bind(&user.hospital_institute)
                    .bind(&user.department)
                    .bind(user.role.as_str())
                    .bind(user.is_approved)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = self
            .timed(
                "get_user",
                sqlx::query_as::<_, UserRow>(&sql).bind(id).fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM users WHERE lower(email) = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );
        let row = self
            .timed(
                "find_user_by_email",
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(normalize_email(email))
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(User::from))
    }

    async fn list_users(&self, pending_only: bool, page: Page) -> Result<Vec<User>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM users WHERE deleted_at IS NULL AND ($1 = FALSE OR is_approved = FALSE) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            USER_COLUMNS
        );
        let rows = self
            .timed(
                "list_users",
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(pending_only)
                    .bind(page.limit as i64)
                    .bind(page.offset as i64)
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn set_user_approval(&self, id: Uuid, approved: bool) -> Result<User, DatabaseError> {
        let sql = format!(
            "UPDATE users SET is_approved = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = self
            .timed(
                "set_user_approval",
                sqlx::query_as::<_, UserRow>(&sql).bind(id).bind(approved).fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into())
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<User, DatabaseError> {
        let sql = format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = self
            .timed(
                "set_user_role",
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(id)
                    .bind(role.as_str())
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into())
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        self.timed(
            "count_users",
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL").fetch_one(&self.pool),
        )
        .await
    }

    async fn create_project(&self, project: NewProject) -> Result<Project, DatabaseError> {
        let sql = format!(
            "INSERT INTO projects (id, name, description, owner_id) VALUES ($1, $2, $3, $4) RETURNING {}",
            PROJECT_COLUMNS
        );
        self.timed(
            "create_project",
            sqlx::query_as::<_, Project>(&sql)
                .bind(Uuid::new_v4())
                .bind(&project.name)
                .bind(&project.description)
                .bind(project.owner_id)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn get_project(&self, id: Uuid, include_deleted: bool) -> Result<Option<Project>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM projects WHERE id = $1 AND ($2 OR deleted_at IS NULL)",
            PROJECT_COLUMNS
        );
        self.timed(
            "get_project",
            sqlx::query_as::<_, Project>(&sql)
                .bind(id)
                .bind(include_deleted)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list_projects(&self, scope: Scope, page: Page) -> Result<Vec<Project>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM projects WHERE deleted_at IS NULL AND ($1::uuid IS NULL OR owner_id = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            PROJECT_COLUMNS
        );
        self.timed(
            "list_projects",
            sqlx::query_as::<_, Project>(&sql)
                .bind(scope.owner())
                .bind(page.limit as i64)
                .bind(page.offset as i64)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> Result<Project, DatabaseError> {
        let sql = format!(
            "UPDATE projects SET name = COALESCE($2, name), description = COALESCE($3, description), \
             updated_at = now() WHERE id = $1 RETURNING {}",
            PROJECT_COLUMNS
        );
        self.timed(
            "update_project",
            sqlx::query_as::<_, Project>(&sql)
                .bind(id)
                .bind(&update.name)
                .bind(&update.description)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn set_project_deleted(&self, id: Uuid, deleted: bool) -> Result<Project, DatabaseError> {
        let sql = format!(
            "UPDATE projects SET deleted_at = CASE WHEN $2 THEN now() ELSE NULL END, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            PROJECT_COLUMNS
        );
        self.timed(
            "set_project_deleted",
            sqlx::query_as::<_, Project>(&sql).bind(id).bind(deleted).fetch_one(&self.pool),
        )
        .await
    }

    async fn create_patient(&self, patient: NewPatient) -> Result<Patient, DatabaseError> {
        let sql = format!(
            "INSERT INTO patients AS p (id, project_id, patient_code, name, gender, date_of_birth, height_cm, weight_kg) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            PATIENT_COLUMNS
        );
        self.timed(
            "create_patient",
            sqlx::query_as::<_, Patient>(&sql)
                .bind(Uuid::new_v4())
                .bind(patient.project_id)
                .bind(&patient.patient_code)
                .bind(&patient.name)
                .bind(&patient.gender)
                .bind(patient.date_of_birth)
                .bind(patient.height_cm)
                .bind(patient.weight_kg)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn get_patient(&self, id: Uuid, include_deleted: bool) -> Result<Option<Patient>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM patients p JOIN projects pj ON pj.id = p.project_id \
             WHERE p.id = $1 AND ($2 OR (p.deleted_at IS NULL AND pj.deleted_at IS NULL))",
            PATIENT_COLUMNS
        );
        self.timed(
            "get_patient",
            sqlx::query_as::<_, Patient>(&sql)
                .bind(id)
                .bind(include_deleted)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list_patients(
        &self,
        scope: Scope,
        project_id: Option<Uuid>,
        page: Page,
    ) -> Result<Vec<Patient>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM patients p JOIN projects pj ON pj.id = p.project_id \
             WHERE p.deleted_at IS NULL AND pj.deleted_at IS NULL \
             AND ($1::uuid IS NULL OR pj.owner_id = $1) AND ($2::uuid IS NULL OR p.project_id = $2) \
             ORDER BY p.created_at DESC LIMIT $3 OFFSET $4",
            PATIENT_COLUMNS
        );
        self.timed(
            "list_patients",
            sqlx::query_as::<_, Patient>(&sql)
                .bind(scope.owner())
                .bind(project_id)
                .bind(page.limit as i64)
                .bind(page.offset as i64)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn update_patient(&self, id: Uuid, update: PatientUpdate) -> Result<Patient, DatabaseError> {
        let sql = format!(
            "UPDATE patients AS p SET name = COALESCE($2, p.name), gender = COALESCE($3, p.gender), \
             date_of_birth = COALESCE($4, p.date_of_birth), height_cm = COALESCE($5, p.height_cm), \
             weight_kg = COALESCE($6, p.weight_kg), updated_at = now() WHERE p.id = $1 RETURNING {}",
            PATIENT_COLUMNS
        );
        self.timed(
            "update_patient",
            sqlx::query_as::<_, Patient>(&sql)
                .bind(id)
                .bind(&update.name)
                .bind(&update.gender)
                .bind(update.date_of_birth)
                .bind(update.height_cm)
                .bind(update.weight_kg)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn set_patient_deleted(&self, id: Uuid, deleted: bool) -> Result<Patient, DatabaseError> {
        let sql = format!(
            "UPDATE patients AS p SET deleted_at = CASE WHEN $2 THEN now() ELSE NULL END, updated_at = now() \
             WHERE p.id = $1 RETURNING {}",
            PATIENT_COLUMNS
        );
        self.timed(
            "set_patient_deleted",
            sqlx::query_as::<_, Patient>(&sql).bind(id).bind(deleted).fetch_one(&self.pool),
        )
        .await
    }

    async fn create_session(&self, session: NewSession) -> Result<ExperimentSession, DatabaseError> {
        let sql = format!(
            "INSERT INTO experiment_sessions (id, patient_id, protocol_id, recorded_by, status, video_path, \
             keypoints_path, video_sha256, keypoints_sha256, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            SESSION_COLUMNS
        );
        let row = self
            .timed(
                "create_session",
                sqlx::query_as::<_, SessionRow>(&sql)
                    .bind(Uuid::new_v4())
                    .bind(session.patient_id)
                    .bind(session.protocol_id)
                    .bind(session.recorded_by)
                    .bind(SessionStatus::Uploaded.as_str())
                    .bind(&session.video_path)
                    .bind(&session.keypoints_path)
                    .bind(&session.video_sha256)
                    .bind(&session.keypoints_sha256)
                    .bind(&session.notes)
                    .fetch_one(&self.pool),
            )
            .await?;
        row.try_into()
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<SessionDetail>, DatabaseError> {
        let sql = format!("{} WHERE s.id = $1", SESSION_DETAIL_SELECT);
        let row = self
            .timed(
                "get_session",
                sqlx::query_as::<_, SessionDetailRow>(&sql).bind(id).fetch_optional(&self.pool),
            )
            .await?;
        row.map(SessionDetail::try_from).transpose()
    }

    async fn list_sessions_for_patient(
        &self,
        patient_id: Uuid,
        page: Page,
    ) -> Result<Vec<SessionDetail>, DatabaseError> {
        let sql = format!(
            "{} WHERE s.patient_id = $1 ORDER BY s.created_at DESC LIMIT $2 OFFSET $3",
            SESSION_DETAIL_SELECT
        );
        let rows = self
            .timed(
                "list_sessions_for_patient",
                sqlx::query_as::<_, SessionDetailRow>(&sql)
                    .bind(patient_id)
                    .bind(page.limit as i64)
                    .bind(page.offset as i64)
                    .fetch_all(&self.pool),
            )
            .await?;
        rows.into_iter().map(SessionDetail::try_from).collect()
    }

    async fn update_session_status(
        &self,
        id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<ExperimentSession, DatabaseError> {
        let sql = format!(
            "UPDATE experiment_sessions SET status = $3, updated_at = now() \
             WHERE id = $1 AND status = $2 RETURNING {}",
            SESSION_COLUMNS
        );
        let row = self
            .timed(
                "update_session_status",
                sqlx::query_as::<_, SessionRow>(&sql)
                    .bind(id)
                    .bind(from.as_str())
                    .bind(to.as_str())
                    .fetch_optional(&self.pool),
            )
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current = self
                    .timed(
                        "session_status",
                        sqlx::query_scalar::<_, String>("SELECT status FROM experiment_sessions WHERE id = $1")
                            .bind(id)
                            .fetch_optional(&self.pool),
                    )
                    .await?;
                match current {
                    Some(status) => Err(DatabaseError::Conflict(format!(
                        "session status changed to '{}' concurrently",
                        status
                    ))),
                    None => Err(DatabaseError::NotFound(format!("session {}", id))),
                }
            }
        }
    }

    async fn count_sessions_for_protocol(&self, protocol_id: Uuid) -> Result<i64, DatabaseError> {
        self.timed(
            "count_sessions_for_protocol",
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM experiment_sessions WHERE protocol_id = $1")
                .bind(protocol_id)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn create_protocol(&self, protocol: NewProtocol) -> Result<Protocol, DatabaseError> {
        let sql = format!(
            "INSERT INTO protocols (id, name, description, version, configuration, is_public, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            PROTOCOL_COLUMNS
        );
        let row = self
            .timed(
                "create_protocol",
                sqlx::query_as::<_, ProtocolRow>(&sql)
                    .bind(Uuid::new_v4())
                    .bind(&protocol.name)
                    .bind(&protocol.description)
                    .bind(&protocol.version)
                    .bind(Json(&protocol.configuration))
                    .bind(protocol.is_public)
                    .bind(protocol.created_by)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into())
    }

    async fn get_protocol(&self, id: Uuid, include_deleted: bool) -> Result<Option<Protocol>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM protocols WHERE id = $1 AND ($2 OR deleted_at IS NULL)",
            PROTOCOL_COLUMNS
        );
        let row = self
            .timed(
                "get_protocol",
                sqlx::query_as::<_, ProtocolRow>(&sql)
                    .bind(id)
                    .bind(include_deleted)
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(Protocol::from))
    }

    async fn list_protocols(&self, filter: ProtocolFilter, page: Page) -> Result<Vec<Protocol>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM protocols WHERE ($1 OR deleted_at IS NULL) \
             AND ($2::uuid IS NULL OR is_public OR created_by = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            PROTOCOL_COLUMNS
        );
        let rows = self
            .timed(
                "list_protocols",
                sqlx::query_as::<_, ProtocolRow>(&sql)
                    .bind(filter.include_deleted)
                    .bind(filter.visible_to)
                    .bind(page.limit as i64)
                    .bind(page.offset as i64)
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(Protocol::from).collect())
    }

    async fn update_protocol(&self, id: Uuid, update: ProtocolUpdate) -> Result<Protocol, DatabaseError> {
        let sql = format!(
            "UPDATE protocols SET name = COALESCE($2, name), description = COALESCE($3, description), \
             version = COALESCE($4, version), configuration = COALESCE($5, configuration), \
             is_public = COALESCE($6, is_public), updated_at = now() WHERE id = $1 RETURNING {}",
            PROTOCOL_COLUMNS
        );
        let row = self
            .timed(
                "update_protocol",
                sqlx::query_as::<_, ProtocolRow>(&sql)
                    .bind(id)
                    .bind(&update.name)
                    .bind(&update.description)
                    .bind(&update.version)
                    .bind(update.configuration.as_ref().map(Json))
                    .bind(update.is_public)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into())
    }

    async fn set_protocol_deleted(&self, id: Uuid, deleted: bool) -> Result<Protocol, DatabaseError> {
        let sql = format!(
            "UPDATE protocols SET deleted_at = CASE WHEN $2 THEN now() ELSE NULL END, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            PROTOCOL_COLUMNS
        );
        let row = self
            .timed(
                "set_protocol_deleted",
                sqlx::query_as::<_, ProtocolRow>(&sql).bind(id).bind(deleted).fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into())
    }

    async fn delete_protocol(&self, id: Uuid) -> Result<(), DatabaseError> {
        // ON DELETE RESTRICT surfaces as a foreign key violation, mapped to Conflict.
        let result = self
            .timed(
                "delete_protocol",
                sqlx::query("DELETE FROM protocols WHERE id = $1").bind(id).execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("protocol {}", id)));
        }
        Ok(())
    }

    async fn stats(&self, scope: Scope) -> Result<Stats, DatabaseError> {
        let owner = scope.owner();

        let projects = self
            .timed(
                "stats_projects",
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM projects WHERE deleted_at IS NULL AND ($1::uuid IS NULL OR owner_id = $1)",
                )
                .bind(owner)
                .fetch_one(&self.pool),
            )
            .await?;

        let patients = self
            .timed(
                "stats_patients",
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM patients p JOIN projects pj ON pj.id = p.project_id \
                     WHERE p.deleted_at IS NULL AND pj.deleted_at IS NULL AND ($1::uuid IS NULL OR pj.owner_id = $1)",
                )
                .bind(owner)
                .fetch_one(&self.pool),
            )
            .await?;

        let by_status: Vec<(String, i64)> = self
            .timed(
                "stats_sessions",
                sqlx::query_as::<_, (String, i64)>(
                    "SELECT s.status, COUNT(*) FROM experiment_sessions s \
                     JOIN patients p ON p.id = s.patient_id JOIN projects pj ON pj.id = p.project_id \
                     WHERE p.deleted_at IS NULL AND pj.deleted_at IS NULL \
                     AND ($1::uuid IS NULL OR pj.owner_id = $1) GROUP BY s.status",
                )
                .bind(owner)
                .fetch_all(&self.pool),
            )
            .await?;

        let protocols = self
            .timed(
                "stats_protocols",
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM protocols WHERE deleted_at IS NULL \
                     AND ($1::uuid IS NULL OR is_public OR created_by = $1)",
                )
                .bind(owner)
                .fetch_one(&self.pool),
            )
            .await?;

        let pending_users = match scope {
            Scope::All => Some(
                self.timed(
                    "stats_pending_users",
                    sqlx::query_scalar::<_, i64>(
                        "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL AND is_approved = FALSE",
                    )
                    .fetch_one(&self.pool),
                )
                .await?,
            ),
            Scope::Owner(_) => None,
        };

        let mut sessions_by_status: BTreeMap<String, i64> = SessionStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut sessions = 0;
        for (status, count) in by_status {
            sessions += count;
            sessions_by_status.insert(status, count);
        }

        Ok(Stats {
            projects,
            patients,
            sessions,
            protocols,
            sessions_by_status,
            pending_users,
        })
    }
}
