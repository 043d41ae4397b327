use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use dispatch_core::agents::{Agent, AgentPatch, NewAgent};
use dispatch_core::assignments::{Assignment, AssignmentPatch, NewAssignment};
use dispatch_core::geo::MapFilter;
use dispatch_core::incidents::{Incident, IncidentPatch, NewIncident};
use dispatch_core::pagination::PageRequest;
use dispatch_core::users::{NewUser, User, UserPatch};

use super::{AgentFilter, AssignmentFilter, DispatchStore, DispatchTx, IncidentFilter, UserFilter};
use crate::error::AppError;

const INCIDENT_COLUMNS: &str = "id, type_incident, message, latitude, longitude, address, \
     reporter_id, status, created_at, updated_at";

const AGENT_COLUMNS: &str = "id, agent_name, agent_type, user_id, status, capacity, \
     active_assignments_count, jurisdiction, is_on_call, auto_accept, last_seen_at, \
     created_at, updated_at";

const ASSIGNMENT_COLUMNS: &str = "id, incident_id, agent_id, status, sla_due_at, accepted_at, \
     started_at, resolved_at, closed_at, notes, created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, is_admin, created_at, updated_at";

const INCIDENT_WHERE: &str = "WHERE ($1::text IS NULL OR status = $1) \
       AND ($2::text IS NULL OR type_incident = $2) \
       AND ($3::text IS NULL OR message ILIKE '%' || $3 || '%')";

const AGENT_WHERE: &str = "WHERE ($1::text IS NULL OR status = $1) \
       AND ($2::text IS NULL OR jurisdiction ILIKE '%' || $2 || '%') \
       AND ($3::text IS NULL OR agent_name ILIKE '%' || $3 || '%')";

const ASSIGNMENT_WHERE: &str = "WHERE ($1::text IS NULL OR status = $1) \
       AND ($2::bigint IS NULL OR agent_id = $2) \
       AND ($3::bigint IS NULL OR incident_id = $3)";

const USER_WHERE: &str = "WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%' \
                              OR email ILIKE '%' || $1 || '%') \
       AND ($2::boolean IS NULL OR is_admin = $2)";

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

// --- Rows ---
//
// Enum columns are TEXT guarded by CHECK constraints; a value that still
// fails to parse means the schema and the code disagree.

#[derive(sqlx::FromRow)]
struct IncidentRow {
    id: i64,
    type_incident: String,
    message: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<String>,
    reporter_id: Option<i64>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = AppError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        Ok(Incident {
            id: row.id,
            type_incident: row.type_incident.parse().map_err(corrupt_row)?,
            message: row.message,
            latitude: row.latitude,
            longitude: row.longitude,
            address: row.address,
            reporter_id: row.reporter_id,
            status: row.status.parse().map_err(corrupt_row)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: i64,
    agent_name: String,
    agent_type: String,
    user_id: i64,
    status: String,
    capacity: i32,
    active_assignments_count: i32,
    jurisdiction: Option<String>,
    is_on_call: bool,
    auto_accept: bool,
    last_seen_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AgentRow> for Agent {
    type Error = AppError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        Ok(Agent {
            id: row.id,
            agent_name: row.agent_name,
            agent_type: row.agent_type,
            user_id: row.user_id,
            status: row.status.parse().map_err(corrupt_row)?,
            capacity: row.capacity,
            active_assignments_count: row.active_assignments_count,
            jurisdiction: row.jurisdiction,
            is_on_call: row.is_on_call,
            auto_accept: row.auto_accept,
            last_seen_at: row.last_seen_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: i64,
    incident_id: i64,
    agent_id: i64,
    status: String,
    sla_due_at: Option<DateTime<Utc>>,
    accepted_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = AppError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        Ok(Assignment {
            id: row.id,
            incident_id: row.incident_id,
            agent_id: row.agent_id,
            status: row.status.parse().map_err(corrupt_row)?,
            sla_due_at: row.sla_due_at,
            accepted_at: row.accepted_at,
            started_at: row.started_at,
            resolved_at: row.resolved_at,
            closed_at: row.closed_at,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            is_admin: row.is_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn corrupt_row(err: dispatch_core::wire::ParseEnumError) -> AppError {
    AppError::Internal(format!("unreadable row: {err}"))
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// --- Read side ---

#[async_trait]
impl DispatchStore for PgStore {
    async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    async fn begin(&self) -> Result<Box<dyn DispatchTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn get_incident(&self, id: i64) -> Result<Option<Incident>, AppError> {
        let sql = format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1");
        sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Incident::try_from)
            .transpose()
    }

    async fn list_incidents(
        &self,
        filter: &IncidentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Incident>, i64), AppError> {
        let status = filter.status.map(|s| s.as_str());
        let kind = filter.type_incident.map(|t| t.as_str());

        let count_sql = format!("SELECT COUNT(*) FROM incidents {INCIDENT_WHERE}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(status)
            .bind(kind)
            .bind(filter.search.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents {INCIDENT_WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(status)
            .bind(kind)
            .bind(filter.search.as_deref())
            .bind(page.page_size)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((convert_all(rows)?, total))
    }

    async fn list_incidents_for_map(&self, filter: &MapFilter) -> Result<Vec<Incident>, AppError> {
        let sql = format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents \
             WHERE latitude IS NOT NULL AND longitude IS NOT NULL \
               AND ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR type_incident = $2) \
               AND ($3::float8 IS NULL OR ( \
                     longitude BETWEEN $3 AND $5 \
                 AND latitude BETWEEN $4::float8 AND $6::float8)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $7"
        );
        let bbox = filter.bbox;
        let rows = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.type_incident.map(|t| t.as_str()))
            .bind(bbox.map(|b| b.min_lng))
            .bind(bbox.map(|b| b.min_lat))
            .bind(bbox.map(|b| b.max_lng))
            .bind(bbox.map(|b| b.max_lat))
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;

        convert_all(rows)
    }

    async fn get_agent(&self, id: i64) -> Result<Option<Agent>, AppError> {
        let sql = format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1");
        sqlx::query_as::<_, AgentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Agent::try_from)
            .transpose()
    }

    async fn list_agents(
        &self,
        filter: &AgentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Agent>, i64), AppError> {
        let status = filter.status.map(|s| s.as_str());

        let count_sql = format!("SELECT COUNT(*) FROM agents {AGENT_WHERE}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(status)
            .bind(filter.jurisdiction.as_deref())
            .bind(filter.search.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {AGENT_COLUMNS} FROM agents {AGENT_WHERE} \
             ORDER BY id ASC LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query_as::<_, AgentRow>(&sql)
            .bind(status)
            .bind(filter.jurisdiction.as_deref())
            .bind(filter.search.as_deref())
            .bind(page.page_size)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((convert_all(rows)?, total))
    }

    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>, AppError> {
        let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1");
        sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Assignment::try_from)
            .transpose()
    }

    async fn list_assignments(
        &self,
        filter: &AssignmentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Assignment>, i64), AppError> {
        let status = filter.status.map(|s| s.as_str());

        let count_sql = format!("SELECT COUNT(*) FROM assignments {ASSIGNMENT_WHERE}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(status)
            .bind(filter.agent_id)
            .bind(filter.incident_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments {ASSIGNMENT_WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(status)
            .bind(filter.agent_id)
            .bind(filter.incident_id)
            .bind(page.page_size)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((convert_all(rows)?, total))
    }

    async fn list_assignments_for_incident(&self, incident_id: i64) -> Result<Vec<Assignment>, AppError> {
        let sql = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE incident_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(incident_id)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<(Vec<User>, i64), AppError> {
        let count_sql = format!("SELECT COUNT(*) FROM users {USER_WHERE}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(filter.search.as_deref())
            .bind(filter.is_admin)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users {USER_WHERE} \
             ORDER BY id ASC LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(filter.search.as_deref())
            .bind(filter.is_admin)
            .bind(page.page_size)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(User::from).collect(), total))
    }
}

// --- Write side ---

impl PgTx {
    async fn select_incident(&mut self, id: i64, lock: bool) -> Result<Option<Incident>, AppError> {
        let suffix = if lock { " FOR UPDATE" } else { "" };
        let sql = format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1{suffix}");
        sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Incident::try_from)
            .transpose()
    }

    async fn select_agent(&mut self, id: i64, lock: bool) -> Result<Option<Agent>, AppError> {
        let suffix = if lock { " FOR UPDATE" } else { "" };
        let sql = format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1{suffix}");
        sqlx::query_as::<_, AgentRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Agent::try_from)
            .transpose()
    }

    async fn delete_by_id(&mut self, table: &str, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DispatchTx for PgTx {
    async fn find_incident(&mut self, id: i64) -> Result<Option<Incident>, AppError> {
        self.select_incident(id, false).await
    }

    async fn lock_incident(&mut self, id: i64) -> Result<Option<Incident>, AppError> {
        self.select_incident(id, true).await
    }

    async fn insert_incident(&mut self, new: &NewIncident) -> Result<Incident, AppError> {
        let sql = format!(
            "INSERT INTO incidents \
               (type_incident, message, latitude, longitude, address, reporter_id, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {INCIDENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(new.type_incident.as_str())
            .bind(&new.message)
            .bind(new.latitude)
            .bind(new.longitude)
            .bind(new.address.as_deref())
            .bind(new.reporter_id)
            .bind(new.status.as_str())
            .fetch_one(&mut *self.tx)
            .await?;
        row.try_into()
    }

    async fn update_incident(
        &mut self,
        id: i64,
        patch: &IncidentPatch,
    ) -> Result<Option<Incident>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE incidents SET updated_at = NOW()");
        if let Some(v) = patch.type_incident {
            qb.push(", type_incident = ").push_bind(v.as_str());
        }
        if let Some(v) = &patch.message {
            qb.push(", message = ").push_bind(v.clone());
        }
        if let Some(v) = patch.latitude {
            qb.push(", latitude = ").push_bind(v);
        }
        if let Some(v) = patch.longitude {
            qb.push(", longitude = ").push_bind(v);
        }
        if let Some(v) = &patch.address {
            qb.push(", address = ").push_bind(v.clone());
        }
        if let Some(v) = patch.reporter_id {
            qb.push(", reporter_id = ").push_bind(v);
        }
        if let Some(v) = patch.status {
            qb.push(", status = ").push_bind(v.as_str());
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(INCIDENT_COLUMNS);

        qb.build_query_as::<IncidentRow>()
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Incident::try_from)
            .transpose()
    }

    async fn delete_incident(&mut self, id: i64) -> Result<bool, AppError> {
        self.delete_by_id("incidents", id).await
    }

    async fn find_agent(&mut self, id: i64) -> Result<Option<Agent>, AppError> {
        self.select_agent(id, false).await
    }

    async fn lock_agent(&mut self, id: i64) -> Result<Option<Agent>, AppError> {
        self.select_agent(id, true).await
    }

    async fn insert_agent(&mut self, new: &NewAgent) -> Result<Agent, AppError> {
        let sql = format!(
            "INSERT INTO agents \
               (agent_name, agent_type, user_id, status, capacity, jurisdiction, \
                is_on_call, auto_accept) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {AGENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AgentRow>(&sql)
            .bind(&new.agent_name)
            .bind(&new.agent_type)
            .bind(new.user_id)
            .bind(new.status.as_str())
            .bind(new.capacity)
            .bind(new.jurisdiction.as_deref())
            .bind(new.is_on_call)
            .bind(new.auto_accept)
            .fetch_one(&mut *self.tx)
            .await?;
        row.try_into()
    }

    async fn update_agent(&mut self, id: i64, patch: &AgentPatch) -> Result<Option<Agent>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE agents SET updated_at = NOW()");
        if let Some(v) = &patch.agent_name {
            qb.push(", agent_name = ").push_bind(v.clone());
        }
        if let Some(v) = &patch.agent_type {
            qb.push(", agent_type = ").push_bind(v.clone());
        }
        if let Some(v) = patch.status {
            qb.push(", status = ").push_bind(v.as_str());
        }
        if let Some(v) = patch.capacity {
            qb.push(", capacity = ").push_bind(v);
        }
        if let Some(v) = &patch.jurisdiction {
            qb.push(", jurisdiction = ").push_bind(v.clone());
        }
        if let Some(v) = patch.is_on_call {
            qb.push(", is_on_call = ").push_bind(v);
        }
        if let Some(v) = patch.auto_accept {
            qb.push(", auto_accept = ").push_bind(v);
        }
        if let Some(v) = patch.last_seen_at {
            qb.push(", last_seen_at = ").push_bind(v);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(AGENT_COLUMNS);

        qb.build_query_as::<AgentRow>()
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Agent::try_from)
            .transpose()
    }

    async fn delete_agent(&mut self, id: i64) -> Result<bool, AppError> {
        self.delete_by_id("agents", id).await
    }

    async fn lock_assignment(&mut self, id: i64) -> Result<Option<Assignment>, AppError> {
        let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Assignment::try_from)
            .transpose()
    }

    async fn insert_assignment(&mut self, new: &NewAssignment) -> Result<Assignment, AppError> {
        let sql = format!(
            "INSERT INTO assignments (incident_id, agent_id, status, sla_due_at, notes) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {ASSIGNMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(new.incident_id)
            .bind(new.agent_id)
            .bind(new.status.as_str())
            .bind(new.sla_due_at)
            .bind(new.notes.as_deref())
            .fetch_one(&mut *self.tx)
            .await?;
        row.try_into()
    }

    async fn update_assignment(
        &mut self,
        id: i64,
        patch: &AssignmentPatch,
    ) -> Result<Option<Assignment>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE assignments SET updated_at = NOW()");
        if let Some(v) = patch.incident_id {
            qb.push(", incident_id = ").push_bind(v);
        }
        if let Some(v) = patch.agent_id {
            qb.push(", agent_id = ").push_bind(v);
        }
        if let Some(v) = patch.status {
            qb.push(", status = ").push_bind(v.as_str());
        }
        if let Some(v) = &patch.notes {
            qb.push(", notes = ").push_bind(v.clone());
        }
        for (column, value) in [
            ("sla_due_at", patch.sla_due_at),
            ("accepted_at", patch.accepted_at),
            ("started_at", patch.started_at),
            ("resolved_at", patch.resolved_at),
            ("closed_at", patch.closed_at),
        ] {
            if let Some(v) = value {
                qb.push(", ").push(column).push(" = ").push_bind(v);
            }
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(ASSIGNMENT_COLUMNS);

        qb.build_query_as::<AssignmentRow>()
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Assignment::try_from)
            .transpose()
    }

    async fn delete_assignment(&mut self, id: i64) -> Result<bool, AppError> {
        self.delete_by_id("assignments", id).await
    }

    async fn lock_user(&mut self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(User::from))
    }

    async fn insert_user(&mut self, new: &NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (name, email, is_admin) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new.name)
            .bind(&new.email)
            .bind(new.is_admin)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn update_user(&mut self, id: i64, patch: &UserPatch) -> Result<Option<User>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");
        if let Some(v) = &patch.name {
            qb.push(", name = ").push_bind(v.clone());
        }
        if let Some(v) = &patch.email {
            qb.push(", email = ").push_bind(v.clone());
        }
        if let Some(v) = patch.is_admin {
            qb.push(", is_admin = ").push_bind(v);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(USER_COLUMNS);

        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(User::from))
    }

    // incidents.reporter_id is ON DELETE SET NULL; agents (and through them
    // assignments) are ON DELETE CASCADE.
    async fn delete_user(&mut self, id: i64) -> Result<bool, AppError> {
        self.delete_by_id("users", id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
