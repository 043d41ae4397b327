use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::wire::wire_enum;

wire_enum! {
    /// Lifecycle state of a dispatch. See [`crate::lifecycle`] for legal moves.
    AssignmentStatus {
        Assigned => "ASSIGNED",
        Accepted => "ACCEPTED",
        Rejected => "REJECTED",
        InProgress => "IN_PROGRESS",
        OnHold => "ON_HOLD",
        Resolved => "RESOLVED",
        Closed => "CLOSED",
    }
}

/// Links one incident to one agent.
///
/// The owner of an assignment is the user who owns the linked agent; there is
/// no owner column on the assignment itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i64,
    pub incident_id: i64,
    pub agent_id: i64,
    pub status: AssignmentStatus,
    pub sla_due_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /v1/assignments`. New assignments always start `ASSIGNED`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub incident_id: i64,
    pub agent_id: i64,
    #[serde(default)]
    pub sla_due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAssignment {
    pub incident_id: i64,
    pub agent_id: i64,
    pub status: AssignmentStatus,
    pub sla_due_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl From<CreateAssignmentRequest> for NewAssignment {
    fn from(req: CreateAssignmentRequest) -> Self {
        Self {
            incident_id: req.incident_id,
            agent_id: req.agent_id,
            status: AssignmentStatus::Assigned,
            sla_due_at: req.sla_due_at,
            notes: req.notes,
        }
    }
}

/// Partial update of an assignment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPatch {
    #[serde(default)]
    pub incident_id: Option<i64>,
    #[serde(default)]
    pub agent_id: Option<i64>,
    #[serde(default)]
    pub status: Option<AssignmentStatus>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub sla_due_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub accepted_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub started_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub resolved_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub closed_at: Option<Option<DateTime<Utc>>>,
}

/// Ownership facts for an assignment, resolved from the persisted agent link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentFacts {
    pub agent_owner_user_id: Option<i64>,
}
