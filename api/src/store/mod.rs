//! Persistence collaborator.
//!
//! Orchestrators only ever see these two traits. `PgStore` backs them with
//! Postgres; `MemoryStore` backs them with in-process tables for tests.

use async_trait::async_trait;

use dispatch_core::agents::{Agent, AgentPatch, AgentStatus, NewAgent};
use dispatch_core::assignments::{Assignment, AssignmentPatch, AssignmentStatus, NewAssignment};
use dispatch_core::geo::MapFilter;
use dispatch_core::incidents::{Incident, IncidentPatch, IncidentStatus, IncidentType, NewIncident};
use dispatch_core::pagination::PageRequest;
use dispatch_core::users::{NewUser, User, UserPatch};

use crate::error::AppError;

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    pub status: Option<IncidentStatus>,
    pub type_incident: Option<IncidentType>,
    /// Case-insensitive substring of the message.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub status: Option<AgentStatus>,
    /// Case-insensitive substring of the jurisdiction.
    pub jurisdiction: Option<String>,
    /// Case-insensitive substring of the agent name.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub status: Option<AssignmentStatus>,
    pub agent_id: Option<i64>,
    pub incident_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive substring of the name or the email.
    pub search: Option<String>,
    pub is_admin: Option<bool>,
}

/// Read side plus the entry point for transactional writes.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// True when the backing store answers.
    async fn ping(&self) -> bool;

    /// Open a unit of work. Dropping it without [`DispatchTx::commit`]
    /// discards every write made through it.
    async fn begin(&self) -> Result<Box<dyn DispatchTx>, AppError>;

    async fn get_incident(&self, id: i64) -> Result<Option<Incident>, AppError>;
    /// Newest first. Returns the page and the total match count.
    async fn list_incidents(
        &self,
        filter: &IncidentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Incident>, i64), AppError>;
    /// Newest first, at most `filter.limit` rows, only rows with coordinates.
    async fn list_incidents_for_map(&self, filter: &MapFilter) -> Result<Vec<Incident>, AppError>;

    async fn get_agent(&self, id: i64) -> Result<Option<Agent>, AppError>;
    /// Ascending id.
    async fn list_agents(
        &self,
        filter: &AgentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Agent>, i64), AppError>;

    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>, AppError>;
    /// Newest first.
    async fn list_assignments(
        &self,
        filter: &AssignmentFilter,
        page: PageRequest,
    ) -> Result<(Vec<Assignment>, i64), AppError>;
    /// Every assignment of one incident, newest first, unpaginated.
    async fn list_assignments_for_incident(&self, incident_id: i64) -> Result<Vec<Assignment>, AppError>;

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;
    /// `email` must already be normalized.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    /// Ascending id.
    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<(Vec<User>, i64), AppError>;
}

/// One database transaction.
///
/// `lock_*` reads take a row lock held until commit or rollback, so the
/// ownership check and the write that follows it see the same row.
#[async_trait]
pub trait DispatchTx: Send {
    async fn find_incident(&mut self, id: i64) -> Result<Option<Incident>, AppError>;
    async fn lock_incident(&mut self, id: i64) -> Result<Option<Incident>, AppError>;
    async fn insert_incident(&mut self, new: &NewIncident) -> Result<Incident, AppError>;
    /// Writes only the fields present in `patch`. `None` if the row vanished.
    async fn update_incident(
        &mut self,
        id: i64,
        patch: &IncidentPatch,
    ) -> Result<Option<Incident>, AppError>;
    async fn delete_incident(&mut self, id: i64) -> Result<bool, AppError>;

    async fn find_agent(&mut self, id: i64) -> Result<Option<Agent>, AppError>;
    async fn lock_agent(&mut self, id: i64) -> Result<Option<Agent>, AppError>;
    async fn insert_agent(&mut self, new: &NewAgent) -> Result<Agent, AppError>;
    async fn update_agent(&mut self, id: i64, patch: &AgentPatch) -> Result<Option<Agent>, AppError>;
    async fn delete_agent(&mut self, id: i64) -> Result<bool, AppError>;

    async fn lock_assignment(&mut self, id: i64) -> Result<Option<Assignment>, AppError>;
    async fn insert_assignment(&mut self, new: &NewAssignment) -> Result<Assignment, AppError>;
    async fn update_assignment(
        &mut self,
        id: i64,
        patch: &AssignmentPatch,
    ) -> Result<Option<Assignment>, AppError>;
    async fn delete_assignment(&mut self, id: i64) -> Result<bool, AppError>;

    async fn lock_user(&mut self, id: i64) -> Result<Option<User>, AppError>;
    async fn insert_user(&mut self, new: &NewUser) -> Result<User, AppError>;
    async fn update_user(&mut self, id: i64, patch: &UserPatch) -> Result<Option<User>, AppError>;
    /// Reported incidents lose their reporter; agent profiles and their
    /// assignments go with the user.
    async fn delete_user(&mut self, id: i64) -> Result<bool, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
