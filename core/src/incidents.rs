use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::actor::AuthContext;
use crate::wire::wire_enum;

wire_enum! {
    /// Kind of reported incident.
    IncidentType {
        Assault => "ASSAULT",
        Fire => "FIRE",
        Accident => "ACCIDENT",
        Emergency => "EMERGENCY",
    }
}

wire_enum! {
    /// Progress of an incident as seen by its reporter.
    IncidentStatus {
        Pending => "PENDING",
        InProgress => "IN_PROGRESS",
        Resolved => "RESOLVED",
    }
}

/// A reported incident. Owned by its reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: i64,
    pub type_incident: IncidentType,
    pub message: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub reporter_id: Option<i64>,
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /v1/incidents`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIncidentRequest {
    pub type_incident: IncidentType,
    pub message: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    /// Honoured for admins only; everyone else reports as themself.
    #[serde(default)]
    pub reporter_id: Option<i64>,
}

/// A fully resolved incident row, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncident {
    pub type_incident: IncidentType,
    pub message: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub reporter_id: Option<i64>,
    pub status: IncidentStatus,
}

/// Partial update of an incident. `None` means "leave untouched";
/// `Some(None)` on a nullable field clears it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncidentPatch {
    #[serde(default)]
    pub type_incident: Option<IncidentType>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<f64>)]
    pub latitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<f64>)]
    pub longitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<String>)]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::wire::present")]
    #[schema(value_type = Option<i64>)]
    pub reporter_id: Option<Option<i64>>,
    #[serde(default)]
    pub status: Option<IncidentStatus>,
}

/// Ownership facts the authorization engine needs about an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncidentFacts {
    pub reporter_id: Option<i64>,
}

impl IncidentFacts {
    pub fn of(incident: &Incident) -> Self {
        Self {
            reporter_id: incident.reporter_id,
        }
    }
}

/// Resolve the server-side values of a new incident.
///
/// The reporter is taken from the actor unless an admin named one explicitly.
/// New incidents always start in `PENDING`.
pub fn apply_creation_defaults(actor: &AuthContext, req: CreateIncidentRequest) -> NewIncident {
    let reporter_id = match req.reporter_id {
        Some(named) if actor.is_admin() => named,
        _ => actor.user_id(),
    };

    NewIncident {
        type_incident: req.type_incident,
        message: req.message,
        latitude: req.latitude,
        longitude: req.longitude,
        address: req.address,
        reporter_id: Some(reporter_id),
        status: IncidentStatus::Pending,
    }
}
