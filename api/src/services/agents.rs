use dispatch_core::actor::AuthContext;
use dispatch_core::agents::{self, Agent, AgentPatch, CreateAgentRequest};
use dispatch_core::mask::FieldPatch;
use dispatch_core::pagination::{Page, PageRequest};
use dispatch_core::policy;

use super::{authorize, mask_patch};
use crate::error::AppError;
use crate::store::{AgentFilter, DispatchStore};

pub async fn get(store: &dyn DispatchStore, id: i64) -> Result<Agent, AppError> {
    store
        .get_agent(id)
        .await?
        .ok_or_else(|| AppError::not_found("agent", id))
}

pub async fn list(
    store: &dyn DispatchStore,
    filter: &AgentFilter,
    page: PageRequest,
) -> Result<Page<Agent>, AppError> {
    let (items, total) = store.list_agents(filter, page).await?;
    Ok(Page::new(items, page, total))
}

/// Register an agent profile. Admin only; one profile per user.
pub async fn create(
    store: &dyn DispatchStore,
    actor: &AuthContext,
    req: CreateAgentRequest,
) -> Result<Agent, AppError> {
    authorize(actor, "agent.create", None, policy::can_create_agent(actor))?;
    let new = agents::apply_creation_defaults(actor, req);

    let mut tx = store.begin().await?;
    let created = tx.insert_agent(&new).await?;
    tx.commit().await?;

    tracing::info!(agent_id = created.id, user_id = created.user_id, "agent created");
    Ok(created)
}

pub async fn update(
    store: &dyn DispatchStore,
    actor: &AuthContext,
    id: i64,
    patch: AgentPatch,
) -> Result<Agent, AppError> {
    let mut tx = store.begin().await?;
    let current = tx
        .lock_agent(id)
        .await?
        .ok_or_else(|| AppError::not_found("agent", id))?;

    let (_, mask) = authorize(actor, "agent.update", Some(id), policy::can_update_agent(actor))?;
    let patch = mask_patch("agent.update", id, mask, patch);
    if patch.is_empty() {
        return Ok(current);
    }

    let updated = tx
        .update_agent(id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("agent", id))?;
    tx.commit().await?;

    tracing::info!(agent_id = id, "agent updated");
    Ok(updated)
}

/// Hard-delete agent `id` together with its assignments.
pub async fn delete(store: &dyn DispatchStore, actor: &AuthContext, id: i64) -> Result<(), AppError> {
    let mut tx = store.begin().await?;
    tx.lock_agent(id)
        .await?
        .ok_or_else(|| AppError::not_found("agent", id))?;

    authorize(actor, "agent.delete", Some(id), policy::can_delete_agent(actor))?;

    if !tx.delete_agent(id).await? {
        return Err(AppError::not_found("agent", id));
    }
    tx.commit().await?;

    tracing::info!(agent_id = id, "agent deleted");
    Ok(())
}
