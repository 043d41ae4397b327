use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use dispatch_core::assignments::{
    Assignment, AssignmentPatch, AssignmentStatus, CreateAssignmentRequest,
};
use dispatch_core::mask::FieldPatch;
use dispatch_core::pagination::{Page, PageRequest};

use super::{check_opt_len, check_positive, require_fields};
use crate::auth::Actor;
use crate::error::AppError;
use crate::extract::{AppJson, AppQuery};
use crate::services;
use crate::state::AppState;
use crate::store::AssignmentFilter;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/assignments", get(list_assignments).post(create_assignment))
        .route(
            "/v1/assignments/{id}",
            get(get_assignment)
                .patch(update_assignment)
                .delete(delete_assignment),
        )
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListAssignmentsParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub status: Option<AssignmentStatus>,
    pub agent_id: Option<i64>,
    pub incident_id: Option<i64>,
}

fn validate_create(req: &CreateAssignmentRequest) -> Result<(), AppError> {
    check_positive("incidentId", req.incident_id)?;
    check_positive("agentId", req.agent_id)?;
    check_opt_len("notes", req.notes.as_deref(), 500)
}

fn validate_patch(patch: &AssignmentPatch) -> Result<(), AppError> {
    require_fields(patch.is_empty())?;
    if let Some(id) = patch.incident_id {
        check_positive("incidentId", id)?;
    }
    if let Some(id) = patch.agent_id {
        check_positive("agentId", id)?;
    }
    check_opt_len("notes", patch.notes.as_ref().and_then(|n| n.as_deref()), 500)
}

#[utoipa::path(
    get,
    path = "/v1/assignments",
    params(ListAssignmentsParams),
    responses(
        (status = 200, description = "One page of assignments, newest first", body = Page<Assignment>),
        (status = 401, description = "Not authenticated", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "assignments"
)]
pub async fn list_assignments(
    _actor: Actor,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListAssignmentsParams>,
) -> Result<Json<Page<Assignment>>, AppError> {
    let filter = AssignmentFilter {
        status: params.status,
        agent_id: params.agent_id,
        incident_id: params.incident_id,
    };
    let page = PageRequest::new(params.page, params.page_size);
    Ok(Json(
        services::assignments::list(state.store.as_ref(), &filter, page).await?,
    ))
}

/// POST /v1/assignments: dispatch an agent to an incident
///
/// Allowed for admins and for the user who owns the agent profile.
/// The assignment always starts `ASSIGNED`.
#[utoipa::path(
    post,
    path = "/v1/assignments",
    request_body = CreateAssignmentRequest,
    responses(
        (status = 201, description = "Assignment created", body = Assignment),
        (status = 403, description = "Caller neither admin nor agent owner", body = dispatch_core::error::ApiError),
        (status = 404, description = "Incident or agent not found", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "assignments"
)]
pub async fn create_assignment(
    Actor(actor): Actor,
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateAssignmentRequest>,
) -> Result<(StatusCode, Json<Assignment>), AppError> {
    validate_create(&req)?;
    let created = services::assignments::create(state.store.as_ref(), &actor, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/assignments/{id}",
    params(("id" = i64, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "The assignment", body = Assignment),
        (status = 404, description = "No such assignment", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "assignments"
)]
pub async fn get_assignment(
    _actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Assignment>, AppError> {
    Ok(Json(services::assignments::get(state.store.as_ref(), id).await?))
}

/// PATCH /v1/assignments/{id}: update or move through the lifecycle
///
/// Status changes must follow the lifecycle; an illegal move is a `409`
/// whose `docs_hint` lists the allowed next states. The agent owner may only
/// change `status`, `notes` and the milestone timestamps.
#[utoipa::path(
    patch,
    path = "/v1/assignments/{id}",
    params(("id" = i64, Path, description = "Assignment id")),
    request_body = AssignmentPatch,
    responses(
        (status = 200, description = "Assignment after the update", body = Assignment),
        (status = 403, description = "Caller neither admin nor agent owner", body = dispatch_core::error::ApiError),
        (status = 404, description = "No such assignment", body = dispatch_core::error::ApiError),
        (status = 409, description = "Illegal status transition", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "assignments"
)]
pub async fn update_assignment(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<AssignmentPatch>,
) -> Result<Json<Assignment>, AppError> {
    validate_patch(&patch)?;
    let updated = services::assignments::update(state.store.as_ref(), &actor, id, patch).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/v1/assignments/{id}",
    params(("id" = i64, Path, description = "Assignment id")),
    responses(
        (status = 204, description = "Assignment deleted"),
        (status = 403, description = "Caller neither admin nor agent owner", body = dispatch_core::error::ApiError),
        (status = 404, description = "No such assignment", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "assignments"
)]
pub async fn delete_assignment(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    services::assignments::delete(state.store.as_ref(), &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
