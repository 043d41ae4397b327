use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use dispatch_core::assignments::Assignment;
use dispatch_core::incidents::{
    CreateIncidentRequest, Incident, IncidentPatch, IncidentStatus, IncidentType,
};
use dispatch_core::mask::FieldPatch;
use dispatch_core::pagination::{Page, PageRequest};

use super::{check_len, check_opt_len, check_range, require_fields};
use crate::auth::Actor;
use crate::error::AppError;
use crate::extract::{AppJson, AppQuery};
use crate::services;
use crate::state::AppState;
use crate::store::IncidentFilter;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/incidents", get(list_incidents).post(create_incident))
        .route(
            "/v1/incidents/{id}",
            get(get_incident).patch(update_incident).delete(delete_incident),
        )
        .route("/v1/incidents/{id}/assignments", get(list_incident_assignments))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListIncidentsParams {
    /// 1-based page number (default 1)
    pub page: Option<i64>,
    /// Items per page, 1..=100 (default 20)
    pub page_size: Option<i64>,
    pub status: Option<IncidentStatus>,
    pub type_incident: Option<IncidentType>,
    /// Case-insensitive substring of the message
    pub search: Option<String>,
}

fn validate_location(
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<&str>,
) -> Result<(), AppError> {
    check_range("latitude", latitude, -90.0, 90.0)?;
    check_range("longitude", longitude, -180.0, 180.0)?;
    check_opt_len("address", address, 255)
}

fn validate_create(req: &CreateIncidentRequest) -> Result<(), AppError> {
    check_len("message", &req.message, 5, 500)?;
    validate_location(req.latitude, req.longitude, req.address.as_deref())
}

fn validate_patch(patch: &IncidentPatch) -> Result<(), AppError> {
    require_fields(patch.is_empty())?;
    if let Some(message) = &patch.message {
        check_len("message", message, 5, 500)?;
    }
    validate_location(
        patch.latitude.flatten(),
        patch.longitude.flatten(),
        patch.address.as_ref().and_then(|a| a.as_deref()),
    )
}

/// GET /v1/incidents: list incidents, newest first
#[utoipa::path(
    get,
    path = "/v1/incidents",
    params(ListIncidentsParams),
    responses(
        (status = 200, description = "One page of incidents", body = Page<Incident>),
        (status = 401, description = "Not authenticated", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn list_incidents(
    _actor: Actor,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListIncidentsParams>,
) -> Result<Json<Page<Incident>>, AppError> {
    let filter = IncidentFilter {
        status: params.status,
        type_incident: params.type_incident,
        search: params.search.filter(|s| !s.trim().is_empty()),
    };
    let page = PageRequest::new(params.page, params.page_size);
    let result = services::incidents::list(state.store.as_ref(), &filter, page).await?;
    Ok(Json(result))
}

/// POST /v1/incidents: report an incident
///
/// Non-admin callers always become the reporter; `reporterId` is honoured
/// for admins only.
#[utoipa::path(
    post,
    path = "/v1/incidents",
    request_body = CreateIncidentRequest,
    responses(
        (status = 201, description = "Incident created", body = Incident),
        (status = 400, description = "Invalid request", body = dispatch_core::error::ApiError),
        (status = 401, description = "Not authenticated", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn create_incident(
    Actor(actor): Actor,
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateIncidentRequest>,
) -> Result<(StatusCode, Json<Incident>), AppError> {
    validate_create(&req)?;
    let created = services::incidents::create(state.store.as_ref(), &actor, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/incidents/{id}",
    params(("id" = i64, Path, description = "Incident id")),
    responses(
        (status = 200, description = "The incident", body = Incident),
        (status = 404, description = "No such incident", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn get_incident(
    _actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Incident>, AppError> {
    Ok(Json(services::incidents::get(state.store.as_ref(), id).await?))
}

/// PATCH /v1/incidents/{id}: partial update
///
/// Reporters may change `message`, `latitude`, `longitude` and `address`;
/// other fields they send are ignored. Admins may change everything.
#[utoipa::path(
    patch,
    path = "/v1/incidents/{id}",
    params(("id" = i64, Path, description = "Incident id")),
    request_body = IncidentPatch,
    responses(
        (status = 200, description = "Incident after the update", body = Incident),
        (status = 400, description = "Invalid patch", body = dispatch_core::error::ApiError),
        (status = 403, description = "Not the reporter", body = dispatch_core::error::ApiError),
        (status = 404, description = "No such incident", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn update_incident(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<IncidentPatch>,
) -> Result<Json<Incident>, AppError> {
    validate_patch(&patch)?;
    let updated = services::incidents::update(state.store.as_ref(), &actor, id, patch).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/v1/incidents/{id}",
    params(("id" = i64, Path, description = "Incident id")),
    responses(
        (status = 204, description = "Incident deleted"),
        (status = 403, description = "Not the reporter", body = dispatch_core::error::ApiError),
        (status = 404, description = "No such incident", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn delete_incident(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    services::incidents::delete(state.store.as_ref(), &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/incidents/{id}/assignments",
    params(("id" = i64, Path, description = "Incident id")),
    responses(
        (status = 200, description = "Assignments of the incident, newest first", body = Vec<Assignment>),
        (status = 404, description = "No such incident", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn list_incident_assignments(
    _actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Assignment>>, AppError> {
    let items = services::assignments::list_for_incident(state.store.as_ref(), id).await?;
    Ok(Json(items))
}
