//! In-process store used by orchestrator and router tests.
//!
//! A transaction holds the table mutex for its whole lifetime and works on a
//! private copy; commit swaps the copy in, drop discards it. Holding the
//! mutex serialises concurrent mutations the way row locks do in Postgres.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use dispatch_core::agents::{Agent, AgentPatch, NewAgent};
use dispatch_core::assignments::{Assignment, AssignmentPatch, NewAssignment};
use dispatch_core::geo::MapFilter;
use dispatch_core::incidents::{Incident, IncidentPatch, NewIncident};
use dispatch_core::pagination::PageRequest;
use dispatch_core::users::{NewUser, User, UserPatch};

use super::{AgentFilter, AssignmentFilter, DispatchStore, DispatchTx, IncidentFilter, UserFilter};
use crate::error::AppError;

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    incidents: BTreeMap<i64, Incident>,
    agents: BTreeMap<i64, Agent>,
    assignments: BTreeMap<i64, Assignment>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with accounts `1..=12` already present; user 1 is an admin.
    pub fn seeded() -> Self {
        Self::with_users(1..=12)
    }

    pub fn with_users(ids: impl IntoIterator<Item = i64>) -> Self {
        let mut tables = Tables::default();
        let now = Utc::now();
        for id in ids {
            tables.users.insert(
                id,
                User {
                    id,
                    name: format!("User {id}"),
                    email: format!("user{id}@dispatch.test"),
                    is_admin: id == 1,
                    created_at: now,
                    updated_at: now,
                },
            );
            tables.last_id = tables.last_id.max(id);
        }
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn paginate<T: Clone>(rows: Vec<&T>, page: PageRequest) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let items = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.page_size as usize)
        .cloned()
        .collect();
    (items, total)
}

fn unique_violation(what: &str) -> AppError {
    AppError::Conflict {
        message: "A row with the same unique key already exists".to_string(),
        docs_hint: Some(format!("Violated constraint: {what}")),
    }
}

fn foreign_key_violation(what: &str) -> AppError {
    AppError::Conflict {
        message: "Referenced row does not exist or is still referenced".to_string(),
        docs_hint: Some(format!("Violated constraint: {what}")),
    }
}

#[async_trait]
impl DispatchStore for MemoryStore {
    async fn ping(&self) -> bool {
        true
    }

    async fn begin(&self) -> Result<Box<dyn DispatchTx>, AppError> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn get_incident(&self, id: i64) -> Result<Option<Incident>, AppError> {
        Ok(self.tables.lock().await.incidents.get(&id).cloned())
    }

    async fn list_incidents(
        &self,
        filter: &IncidentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Incident>, i64), AppError> {
        let tables = self.tables.lock().await;
        let rows: Vec<&Incident> = tables
            .incidents
            .values()
            .rev()
            .filter(|i| filter.status.is_none_or(|s| s == i.status))
            .filter(|i| filter.type_incident.is_none_or(|t| t == i.type_incident))
            .filter(|i| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|q| contains_ci(&i.message, q))
            })
            .collect();
        Ok(paginate(rows, page))
    }

    async fn list_incidents_for_map(&self, filter: &MapFilter) -> Result<Vec<Incident>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .incidents
            .values()
            .rev()
            .filter(|i| i.latitude.is_some() && i.longitude.is_some())
            .filter(|i| filter.matches(i))
            .take(filter.limit as usize)
            .cloned()
            .collect())
    }

    async fn get_agent(&self, id: i64) -> Result<Option<Agent>, AppError> {
        Ok(self.tables.lock().await.agents.get(&id).cloned())
    }

    async fn list_agents(
        &self,
        filter: &AgentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Agent>, i64), AppError> {
        let tables = self.tables.lock().await;
        let rows: Vec<&Agent> = tables
            .agents
            .values()
            .filter(|a| filter.status.is_none_or(|s| s == a.status))
            .filter(|a| {
                filter.jurisdiction.as_deref().is_none_or(|q| {
                    a.jurisdiction
                        .as_deref()
                        .is_some_and(|j| contains_ci(j, q))
                })
            })
            .filter(|a| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|q| contains_ci(&a.agent_name, q))
            })
            .collect();
        Ok(paginate(rows, page))
    }

    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>, AppError> {
        Ok(self.tables.lock().await.assignments.get(&id).cloned())
    }

    async fn list_assignments(
        &self,
        filter: &AssignmentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Assignment>, i64), AppError> {
        let tables = self.tables.lock().await;
        let rows: Vec<&Assignment> = tables
            .assignments
            .values()
            .rev()
            .filter(|a| filter.status.is_none_or(|s| s == a.status))
            .filter(|a| filter.agent_id.is_none_or(|id| id == a.agent_id))
            .filter(|a| filter.incident_id.is_none_or(|id| id == a.incident_id))
            .collect();
        Ok(paginate(rows, page))
    }

    async fn list_assignments_for_incident(&self, incident_id: i64) -> Result<Vec<Assignment>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .assignments
            .values()
            .rev()
            .filter(|a| a.incident_id == incident_id)
            .cloned()
            .collect())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<(Vec<User>, i64), AppError> {
        let tables = self.tables.lock().await;
        let rows: Vec<&User> = tables
            .users
            .values()
            .filter(|u| filter.is_admin.is_none_or(|a| a == u.is_admin))
            .filter(|u| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|q| contains_ci(&u.name, q) || contains_ci(&u.email, q))
            })
            .collect();
        Ok(paginate(rows, page))
    }
}

#[async_trait]
impl DispatchTx for MemoryTx {
    async fn find_incident(&mut self, id: i64) -> Result<Option<Incident>, AppError> {
        Ok(self.work.incidents.get(&id).cloned())
    }

    async fn lock_incident(&mut self, id: i64) -> Result<Option<Incident>, AppError> {
        self.find_incident(id).await
    }

    async fn insert_incident(&mut self, new: &NewIncident) -> Result<Incident, AppError> {
        if new
            .reporter_id
            .is_some_and(|id| !self.work.users.contains_key(&id))
        {
            return Err(foreign_key_violation("incidents_reporter_id_fkey"));
        }
        let now = Utc::now();
        let incident = Incident {
            id: self.work.next_id(),
            type_incident: new.type_incident,
            message: new.message.clone(),
            latitude: new.latitude,
            longitude: new.longitude,
            address: new.address.clone(),
            reporter_id: new.reporter_id,
            status: new.status,
            created_at: now,
            updated_at: now,
        };
        self.work.incidents.insert(incident.id, incident.clone());
        Ok(incident)
    }

    async fn update_incident(
        &mut self,
        id: i64,
        patch: &IncidentPatch,
    ) -> Result<Option<Incident>, AppError> {
        if patch
            .reporter_id
            .flatten()
            .is_some_and(|reporter| !self.work.users.contains_key(&reporter))
        {
            return Err(foreign_key_violation("incidents_reporter_id_fkey"));
        }
        let Some(row) = self.work.incidents.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = patch.type_incident {
            row.type_incident = v;
        }
        if let Some(v) = &patch.message {
            row.message = v.clone();
        }
        if let Some(v) = patch.latitude {
            row.latitude = v;
        }
        if let Some(v) = patch.longitude {
            row.longitude = v;
        }
        if let Some(v) = &patch.address {
            row.address = v.clone();
        }
        if let Some(v) = patch.reporter_id {
            row.reporter_id = v;
        }
        if let Some(v) = patch.status {
            row.status = v;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete_incident(&mut self, id: i64) -> Result<bool, AppError> {
        let removed = self.work.incidents.remove(&id).is_some();
        if removed {
            self.work.assignments.retain(|_, a| a.incident_id != id);
        }
        Ok(removed)
    }

    async fn find_agent(&mut self, id: i64) -> Result<Option<Agent>, AppError> {
        Ok(self.work.agents.get(&id).cloned())
    }

    async fn lock_agent(&mut self, id: i64) -> Result<Option<Agent>, AppError> {
        self.find_agent(id).await
    }

    async fn insert_agent(&mut self, new: &NewAgent) -> Result<Agent, AppError> {
        if !self.work.users.contains_key(&new.user_id) {
            return Err(foreign_key_violation("agents_user_id_fkey"));
        }
        if self.work.agents.values().any(|a| a.user_id == new.user_id) {
            return Err(unique_violation("agents_user_id_key"));
        }
        let now = Utc::now();
        let agent = Agent {
            id: self.work.next_id(),
            agent_name: new.agent_name.clone(),
            agent_type: new.agent_type.clone(),
            user_id: new.user_id,
            status: new.status,
            capacity: new.capacity,
            active_assignments_count: 0,
            jurisdiction: new.jurisdiction.clone(),
            is_on_call: new.is_on_call,
            auto_accept: new.auto_accept,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
        };
        self.work.agents.insert(agent.id, agent.clone());
        Ok(agent)
    }

    async fn update_agent(&mut self, id: i64, patch: &AgentPatch) -> Result<Option<Agent>, AppError> {
        let Some(row) = self.work.agents.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = &patch.agent_name {
            row.agent_name = v.clone();
        }
        if let Some(v) = &patch.agent_type {
            row.agent_type = v.clone();
        }
        if let Some(v) = patch.status {
            row.status = v;
        }
        if let Some(v) = patch.capacity {
            row.capacity = v;
        }
        if let Some(v) = &patch.jurisdiction {
            row.jurisdiction = v.clone();
        }
        if let Some(v) = patch.is_on_call {
            row.is_on_call = v;
        }
        if let Some(v) = patch.auto_accept {
            row.auto_accept = v;
        }
        if let Some(v) = patch.last_seen_at {
            row.last_seen_at = v;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete_agent(&mut self, id: i64) -> Result<bool, AppError> {
        let removed = self.work.agents.remove(&id).is_some();
        if removed {
            self.work.assignments.retain(|_, a| a.agent_id != id);
        }
        Ok(removed)
    }

    async fn lock_assignment(&mut self, id: i64) -> Result<Option<Assignment>, AppError> {
        Ok(self.work.assignments.get(&id).cloned())
    }

    async fn insert_assignment(&mut self, new: &NewAssignment) -> Result<Assignment, AppError> {
        if !self.work.incidents.contains_key(&new.incident_id) {
            return Err(foreign_key_violation("assignments_incident_id_fkey"));
        }
        if !self.work.agents.contains_key(&new.agent_id) {
            return Err(foreign_key_violation("assignments_agent_id_fkey"));
        }
        let now = Utc::now();
        let assignment = Assignment {
            id: self.work.next_id(),
            incident_id: new.incident_id,
            agent_id: new.agent_id,
            status: new.status,
            sla_due_at: new.sla_due_at,
            accepted_at: None,
            started_at: None,
            resolved_at: None,
            closed_at: None,
            notes: new.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        self.work.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn update_assignment(
        &mut self,
        id: i64,
        patch: &AssignmentPatch,
    ) -> Result<Option<Assignment>, AppError> {
        if patch
            .incident_id
            .is_some_and(|incident_id| !self.work.incidents.contains_key(&incident_id))
        {
            return Err(foreign_key_violation("assignments_incident_id_fkey"));
        }
        if patch
            .agent_id
            .is_some_and(|agent_id| !self.work.agents.contains_key(&agent_id))
        {
            return Err(foreign_key_violation("assignments_agent_id_fkey"));
        }
        let Some(row) = self.work.assignments.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = patch.incident_id {
            row.incident_id = v;
        }
        if let Some(v) = patch.agent_id {
            row.agent_id = v;
        }
        if let Some(v) = patch.status {
            row.status = v;
        }
        if let Some(v) = &patch.notes {
            row.notes = v.clone();
        }
        if let Some(v) = patch.sla_due_at {
            row.sla_due_at = v;
        }
        if let Some(v) = patch.accepted_at {
            row.accepted_at = v;
        }
        if let Some(v) = patch.started_at {
            row.started_at = v;
        }
        if let Some(v) = patch.resolved_at {
            row.resolved_at = v;
        }
        if let Some(v) = patch.closed_at {
            row.closed_at = v;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete_assignment(&mut self, id: i64) -> Result<bool, AppError> {
        Ok(self.work.assignments.remove(&id).is_some())
    }

    async fn lock_user(&mut self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn insert_user(&mut self, new: &NewUser) -> Result<User, AppError> {
        if self.work.email_taken(&new.email, None) {
            return Err(unique_violation("users_email_key"));
        }
        let now = Utc::now();
        let user = User {
            id: self.work.next_id(),
            name: new.name.clone(),
            email: new.email.clone(),
            is_admin: new.is_admin,
            created_at: now,
            updated_at: now,
        };
        self.work.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&mut self, id: i64, patch: &UserPatch) -> Result<Option<User>, AppError> {
        if patch
            .email
            .as_deref()
            .is_some_and(|email| self.work.email_taken(email, Some(id)))
        {
            return Err(unique_violation("users_email_key"));
        }
        let Some(row) = self.work.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = &patch.name {
            row.name = v.clone();
        }
        if let Some(v) = &patch.email {
            row.email = v.clone();
        }
        if let Some(v) = patch.is_admin {
            row.is_admin = v;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete_user(&mut self, id: i64) -> Result<bool, AppError> {
        if self.work.users.remove(&id).is_none() {
            return Ok(false);
        }
        for incident in self.work.incidents.values_mut() {
            if incident.reporter_id == Some(id) {
                incident.reporter_id = None;
            }
        }
        let agents: Vec<i64> = self
            .work
            .agents
            .values()
            .filter(|a| a.user_id == id)
            .map(|a| a.id)
            .collect();
        self.work.agents.retain(|_, a| a.user_id != id);
        self.work
            .assignments
            .retain(|_, a| !agents.contains(&a.agent_id));
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use dispatch_core::agents::AgentStatus;
    use dispatch_core::incidents::{IncidentStatus, IncidentType};

    use super::*;

    fn incident_by(reporter_id: Option<i64>) -> NewIncident {
        NewIncident {
            type_incident: IncidentType::Emergency,
            message: "Person collapsed at the station".to_string(),
            latitude: None,
            longitude: None,
            address: None,
            reporter_id,
            status: IncidentStatus::Pending,
        }
    }

    #[tokio::test]
    async fn user_references_are_enforced() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx.insert_incident(&incident_by(Some(3))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { docs_hint: Some(ref h), .. } if h.contains("incidents_reporter_id_fkey")));
        tx.insert_incident(&incident_by(None)).await.unwrap();

        let agent = NewAgent {
            agent_name: "Orphan".to_string(),
            agent_type: "GENERAL".to_string(),
            user_id: 3,
            status: AgentStatus::Offline,
            capacity: 3,
            jurisdiction: None,
            is_on_call: false,
            auto_accept: false,
        };
        let err = tx.insert_agent(&agent).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { docs_hint: Some(ref h), .. } if h.contains("agents_user_id_fkey")));
    }

    #[tokio::test]
    async fn seeded_ids_are_never_reused() {
        let store = MemoryStore::with_users([3, 9]);
        let mut tx = store.begin().await.unwrap();
        let incident = tx.insert_incident(&incident_by(Some(9))).await.unwrap();
        assert_eq!(incident.id, 10);

        let user = tx
            .insert_user(&NewUser {
                name: "Nuevo".to_string(),
                email: "nuevo@dispatch.test".to_string(),
                is_admin: false,
            })
            .await
            .unwrap();
        assert_eq!(user.id, 11);
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let store = MemoryStore::seeded();
        {
            let mut tx = store.begin().await.unwrap();
            tx.delete_user(3).await.unwrap();
        }
        assert!(store.get_user(3).await.unwrap().is_some());
    }
}
