use dispatch_core::actor::AuthContext;
use dispatch_core::incidents::{
    self, CreateIncidentRequest, Incident, IncidentFacts, IncidentPatch,
};
use dispatch_core::mask::FieldPatch;
use dispatch_core::pagination::{Page, PageRequest};
use dispatch_core::policy;

use super::{authorize, mask_patch};
use crate::error::AppError;
use crate::store::{DispatchStore, IncidentFilter};

pub async fn get(store: &dyn DispatchStore, id: i64) -> Result<Incident, AppError> {
    store
        .get_incident(id)
        .await?
        .ok_or_else(|| AppError::not_found("incident", id))
}

pub async fn list(
    store: &dyn DispatchStore,
    filter: &IncidentFilter,
    page: PageRequest,
) -> Result<Page<Incident>, AppError> {
    let (items, total) = store.list_incidents(filter, page).await?;
    Ok(Page::new(items, page, total))
}

/// Report a new incident. The reporter is resolved from the actor.
pub async fn create(
    store: &dyn DispatchStore,
    actor: &AuthContext,
    req: CreateIncidentRequest,
) -> Result<Incident, AppError> {
    authorize(actor, "incident.create", None, policy::can_create_incident(actor))?;
    let new = incidents::apply_creation_defaults(actor, req);

    let mut tx = store.begin().await?;
    let created = tx.insert_incident(&new).await?;
    tx.commit().await?;

    tracing::info!(
        incident_id = created.id,
        reporter_id = created.reporter_id,
        "incident created"
    );
    Ok(created)
}

/// Apply `patch` to incident `id` as far as the actor may.
///
/// A reporter's patch silently loses `typeIncident`, `status` and
/// `reporterId`. If nothing survives the mask the current row is returned
/// and nothing is written.
pub async fn update(
    store: &dyn DispatchStore,
    actor: &AuthContext,
    id: i64,
    patch: IncidentPatch,
) -> Result<Incident, AppError> {
    let mut tx = store.begin().await?;
    let current = tx
        .lock_incident(id)
        .await?
        .ok_or_else(|| AppError::not_found("incident", id))?;

    let decision = policy::can_update_incident(actor, &IncidentFacts::of(&current));
    let (_, mask) = authorize(actor, "incident.update", Some(id), decision)?;
    let patch = mask_patch("incident.update", id, mask, patch);
    if patch.is_empty() {
        return Ok(current);
    }

    let updated = tx
        .update_incident(id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("incident", id))?;
    tx.commit().await?;

    tracing::info!(incident_id = id, "incident updated");
    Ok(updated)
}

/// Hard-delete incident `id`. Its assignments go with it.
pub async fn delete(store: &dyn DispatchStore, actor: &AuthContext, id: i64) -> Result<(), AppError> {
    let mut tx = store.begin().await?;
    let current = tx
        .lock_incident(id)
        .await?
        .ok_or_else(|| AppError::not_found("incident", id))?;

    let decision = policy::can_delete_incident(actor, &IncidentFacts::of(&current));
    authorize(actor, "incident.delete", Some(id), decision)?;

    if !tx.delete_incident(id).await? {
        return Err(AppError::not_found("incident", id));
    }
    tx.commit().await?;

    tracing::info!(incident_id = id, "incident deleted");
    Ok(())
}
