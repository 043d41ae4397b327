use chrono::Utc;

use dispatch_core::actor::AuthContext;
use dispatch_core::assignments::{
    Assignment, AssignmentFacts, AssignmentPatch, CreateAssignmentRequest, NewAssignment,
};
use dispatch_core::lifecycle;
use dispatch_core::mask::FieldPatch;
use dispatch_core::pagination::{Page, PageRequest};
use dispatch_core::policy::{self, Grant};

use super::{authorize, mask_patch};
use crate::error::AppError;
use crate::store::{AssignmentFilter, DispatchStore, DispatchTx};

pub async fn get(store: &dyn DispatchStore, id: i64) -> Result<Assignment, AppError> {
    store
        .get_assignment(id)
        .await?
        .ok_or_else(|| AppError::not_found("assignment", id))
}

pub async fn list(
    store: &dyn DispatchStore,
    filter: &AssignmentFilter,
    page: PageRequest,
) -> Result<Page<Assignment>, AppError> {
    let (items, total) = store.list_assignments(filter, page).await?;
    Ok(Page::new(items, page, total))
}

/// Every assignment of one incident, newest first.
pub async fn list_for_incident(
    store: &dyn DispatchStore,
    incident_id: i64,
) -> Result<Vec<Assignment>, AppError> {
    store
        .get_incident(incident_id)
        .await?
        .ok_or_else(|| AppError::not_found("incident", incident_id))?;
    store.list_assignments_for_incident(incident_id).await
}

/// Owner of the agent an assignment is linked to, read inside `tx`.
///
/// A dangling agent link yields `None`, which grants nothing to non-admins.
async fn resolve_facts(tx: &mut dyn DispatchTx, agent_id: i64) -> Result<AssignmentFacts, AppError> {
    let agent = tx.find_agent(agent_id).await?;
    Ok(AssignmentFacts {
        agent_owner_user_id: agent.map(|a| a.user_id),
    })
}

/// Dispatch an agent to an incident. Always starts in `ASSIGNED`.
///
/// The agent and incident must exist; the agent's owner decides who besides
/// an admin may create the link.
pub async fn create(
    store: &dyn DispatchStore,
    actor: &AuthContext,
    req: CreateAssignmentRequest,
) -> Result<Assignment, AppError> {
    let mut tx = store.begin().await?;
    let agent = tx
        .find_agent(req.agent_id)
        .await?
        .ok_or_else(|| AppError::not_found("agent", req.agent_id))?;
    tx.find_incident(req.incident_id)
        .await?
        .ok_or_else(|| AppError::not_found("incident", req.incident_id))?;

    let facts = AssignmentFacts {
        agent_owner_user_id: Some(agent.user_id),
    };
    authorize(
        actor,
        "assignment.create",
        None,
        policy::can_create_assignment(actor, &facts),
    )?;

    let created = tx.insert_assignment(&NewAssignment::from(req)).await?;
    tx.commit().await?;

    tracing::info!(
        assignment_id = created.id,
        incident_id = created.incident_id,
        agent_id = created.agent_id,
        "assignment created"
    );
    Ok(created)
}

/// Apply `patch` to assignment `id`.
///
/// Ownership comes from the agent currently linked in the database, never
/// from `agentId` in the patch. A status change must be a legal transition;
/// its milestone timestamp is stamped unless the patch already carries it.
pub async fn update(
    store: &dyn DispatchStore,
    actor: &AuthContext,
    id: i64,
    patch: AssignmentPatch,
) -> Result<Assignment, AppError> {
    let mut tx = store.begin().await?;
    let now = Utc::now();
    let current = tx
        .lock_assignment(id)
        .await?
        .ok_or_else(|| AppError::not_found("assignment", id))?;

    let facts = resolve_facts(tx.as_mut(), current.agent_id).await?;
    let decision = policy::can_update_assignment(actor, &facts);
    let (grant, mask) = authorize(actor, "assignment.update", Some(id), decision)?;
    let mut patch = mask_patch("assignment.update", id, mask, patch);

    if grant == Grant::Admin {
        if let Some(agent_id) = patch.agent_id {
            tx.find_agent(agent_id)
                .await?
                .ok_or_else(|| AppError::not_found("agent", agent_id))?;
        }
        if let Some(incident_id) = patch.incident_id {
            tx.find_incident(incident_id)
                .await?
                .ok_or_else(|| AppError::not_found("incident", incident_id))?;
        }
    }

    lifecycle::apply_transition(current.status, &mut patch, now)?;
    if patch.is_empty() {
        return Ok(current);
    }

    let updated = tx
        .update_assignment(id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("assignment", id))?;
    tx.commit().await?;

    tracing::info!(
        assignment_id = id,
        from = current.status.as_str(),
        to = updated.status.as_str(),
        "assignment updated"
    );
    Ok(updated)
}

pub async fn delete(store: &dyn DispatchStore, actor: &AuthContext, id: i64) -> Result<(), AppError> {
    let mut tx = store.begin().await?;
    let current = tx
        .lock_assignment(id)
        .await?
        .ok_or_else(|| AppError::not_found("assignment", id))?;

    let facts = resolve_facts(tx.as_mut(), current.agent_id).await?;
    let decision = policy::can_delete_assignment(actor, &facts);
    authorize(actor, "assignment.delete", Some(id), decision)?;

    if !tx.delete_assignment(id).await? {
        return Err(AppError::not_found("assignment", id));
    }
    tx.commit().await?;

    tracing::info!(assignment_id = id, "assignment deleted");
    Ok(())
}
