use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use dispatch_core::geo::{FeatureCollection, MapFilter};
use dispatch_core::incidents::{IncidentStatus, IncidentType};

use crate::auth::Actor;
use crate::error::AppError;
use crate::extract::AppQuery;
use crate::services;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/map/incidents", get(map_incidents))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MapParams {
    pub status: Option<IncidentStatus>,
    pub type_incident: Option<IncidentType>,
    /// `minLng,minLat,maxLng,maxLat`; ignored when malformed
    pub bbox: Option<String>,
    /// Max features, 1..=500 (default 100)
    pub limit: Option<i64>,
}

/// GET /v1/map/incidents: incidents with coordinates as GeoJSON
#[utoipa::path(
    get,
    path = "/v1/map/incidents",
    params(MapParams),
    responses(
        (status = 200, description = "GeoJSON FeatureCollection of points", body = FeatureCollection),
        (status = 401, description = "Not authenticated", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "map"
)]
pub async fn map_incidents(
    _actor: Actor,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<MapParams>,
) -> Result<Json<FeatureCollection>, AppError> {
    let filter = MapFilter::new(
        params.status,
        params.type_incident,
        params.bbox.as_deref(),
        params.limit,
    );
    Ok(Json(
        services::map::list_for_map(state.store.as_ref(), &filter).await?,
    ))
}
