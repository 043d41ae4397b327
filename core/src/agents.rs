use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::actor::AuthContext;
use crate::wire::wire_enum;

pub const DEFAULT_AGENT_TYPE: &str = "GENERAL";
pub const DEFAULT_CAPACITY: i32 = 3;

wire_enum! {
    /// Availability of a field agent.
    AgentStatus {
        Available => "AVAILABLE",
        Busy => "BUSY",
        Offline => "OFFLINE",
    }
}

/// A field agent profile, operated by the user in `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: i64,
    pub agent_name: String,
    pub agent_type: String,
    pub user_id: i64,
    pub status: AgentStatus,
    pub capacity: i32,
    pub active_assignments_count: i32,
    pub jurisdiction: Option<String>,
    pub is_on_call: bool,
    pub auto_accept: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /v1/agents`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub agent_name: String,
    #[serde(default)]
    pub agent_type: Option<String>,
    /// Owner of the profile; defaults to the acting admin.
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub status: Option<AgentStatus>,
    #[serde(default)]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub is_on_call: Option<bool>,
    #[serde(default)]
    pub auto_accept: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAgent {
    pub agent_name: String,
    pub agent_type: String,
    pub user_id: i64,
    pub status: AgentStatus,
    pub capacity: i32,
    pub jurisdiction: Option<String>,
    pub is_on_call: bool,
    pub auto_accept: bool,
}

/// Partial update of an agent profile. Admin-only, never masked.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentPatch {
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub status: Option<AgentStatus>,
    #[serde(default)]
    pub capacity: Option<i32>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<String>)]
    pub jurisdiction: Option<Option<String>>,
    #[serde(default)]
    pub is_on_call: Option<bool>,
    #[serde(default)]
    pub auto_accept: Option<bool>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub last_seen_at: Option<Option<DateTime<Utc>>>,
}

/// Fill in the defaults of a new agent profile.
pub fn apply_creation_defaults(actor: &AuthContext, req: CreateAgentRequest) -> NewAgent {
    NewAgent {
        agent_name: req.agent_name,
        agent_type: req
            .agent_type
            .unwrap_or_else(|| DEFAULT_AGENT_TYPE.to_string()),
        user_id: req.user_id.unwrap_or_else(|| actor.user_id()),
        status: req.status.unwrap_or(AgentStatus::Offline),
        capacity: req.capacity.unwrap_or(DEFAULT_CAPACITY),
        jurisdiction: req.jurisdiction,
        is_on_call: req.is_on_call.unwrap_or(false),
        auto_accept: req.auto_accept.unwrap_or(false),
    }
}
