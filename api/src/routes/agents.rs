use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use dispatch_core::agents::{Agent, AgentPatch, AgentStatus, CreateAgentRequest};
use dispatch_core::mask::FieldPatch;
use dispatch_core::pagination::{Page, PageRequest};

use super::{check_len, check_opt_len, check_positive, require_fields};
use crate::auth::Actor;
use crate::error::AppError;
use crate::extract::{AppJson, AppQuery};
use crate::services;
use crate::state::AppState;
use crate::store::AgentFilter;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/agents", get(list_agents).post(create_agent))
        .route(
            "/v1/agents/{id}",
            get(get_agent).patch(update_agent).delete(delete_agent),
        )
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListAgentsParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub status: Option<AgentStatus>,
    /// Case-insensitive substring of the jurisdiction
    pub jurisdiction: Option<String>,
    /// Case-insensitive substring of the agent name
    pub search: Option<String>,
}

fn check_capacity(value: Option<i32>) -> Result<(), AppError> {
    match value {
        Some(c) if !(1..=50).contains(&c) => Err(AppError::validation(
            "capacity",
            "capacity must be between 1 and 50",
        )),
        _ => Ok(()),
    }
}

fn validate_create(req: &CreateAgentRequest) -> Result<(), AppError> {
    check_len("agentName", &req.agent_name, 1, 120)?;
    if let Some(kind) = &req.agent_type {
        check_len("agentType", kind, 1, 40)?;
    }
    if let Some(user_id) = req.user_id {
        check_positive("userId", user_id)?;
    }
    check_capacity(req.capacity)?;
    check_opt_len("jurisdiction", req.jurisdiction.as_deref(), 120)
}

fn validate_patch(patch: &AgentPatch) -> Result<(), AppError> {
    require_fields(patch.is_empty())?;
    if let Some(name) = &patch.agent_name {
        check_len("agentName", name, 1, 120)?;
    }
    if let Some(kind) = &patch.agent_type {
        check_len("agentType", kind, 1, 40)?;
    }
    check_capacity(patch.capacity)?;
    check_opt_len(
        "jurisdiction",
        patch.jurisdiction.as_ref().and_then(|j| j.as_deref()),
        120,
    )
}

#[utoipa::path(
    get,
    path = "/v1/agents",
    params(ListAgentsParams),
    responses(
        (status = 200, description = "One page of agents, by id", body = Page<Agent>),
        (status = 401, description = "Not authenticated", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "agents"
)]
pub async fn list_agents(
    _actor: Actor,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListAgentsParams>,
) -> Result<Json<Page<Agent>>, AppError> {
    let filter = AgentFilter {
        status: params.status,
        jurisdiction: params.jurisdiction.filter(|s| !s.trim().is_empty()),
        search: params.search.filter(|s| !s.trim().is_empty()),
    };
    let page = PageRequest::new(params.page, params.page_size);
    Ok(Json(
        services::agents::list(state.store.as_ref(), &filter, page).await?,
    ))
}

/// POST /v1/agents: register an agent profile (admin only)
#[utoipa::path(
    post,
    path = "/v1/agents",
    request_body = CreateAgentRequest,
    responses(
        (status = 201, description = "Agent created", body = Agent),
        (status = 403, description = "Caller is not an admin", body = dispatch_core::error::ApiError),
        (status = 409, description = "User already has an agent profile", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "agents"
)]
pub async fn create_agent(
    Actor(actor): Actor,
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), AppError> {
    validate_create(&req)?;
    let created = services::agents::create(state.store.as_ref(), &actor, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/agents/{id}",
    params(("id" = i64, Path, description = "Agent id")),
    responses(
        (status = 200, description = "The agent", body = Agent),
        (status = 404, description = "No such agent", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "agents"
)]
pub async fn get_agent(
    _actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Agent>, AppError> {
    Ok(Json(services::agents::get(state.store.as_ref(), id).await?))
}

#[utoipa::path(
    patch,
    path = "/v1/agents/{id}",
    params(("id" = i64, Path, description = "Agent id")),
    request_body = AgentPatch,
    responses(
        (status = 200, description = "Agent after the update", body = Agent),
        (status = 403, description = "Caller is not an admin", body = dispatch_core::error::ApiError),
        (status = 404, description = "No such agent", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "agents"
)]
pub async fn update_agent(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<AgentPatch>,
) -> Result<Json<Agent>, AppError> {
    validate_patch(&patch)?;
    let updated = services::agents::update(state.store.as_ref(), &actor, id, patch).await?;
    Ok(Json(updated))
}

/// DELETE /v1/agents/{id}: remove a profile and its assignments (admin only)
#[utoipa::path(
    delete,
    path = "/v1/agents/{id}",
    params(("id" = i64, Path, description = "Agent id")),
    responses(
        (status = 204, description = "Agent deleted"),
        (status = 403, description = "Caller is not an admin", body = dispatch_core::error::ApiError),
        (status = 404, description = "No such agent", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "agents"
)]
pub async fn delete_agent(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    services::agents::delete(state.store.as_ref(), &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
