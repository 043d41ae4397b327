//! Mutation orchestrators: the only code that writes through the store.
//!
//! Every mutation runs as one unit of work: open a transaction, resolve
//! ownership facts from persisted rows, decide, mask, write, commit. Any
//! early return drops the transaction and rolls it back.

use dispatch_core::actor::AuthContext;
use dispatch_core::mask::{self, FieldPatch};
use dispatch_core::policy::{Decision, Grant};

use crate::error::AppError;

pub mod agents;
pub mod assignments;
pub mod incidents;
pub mod map;
pub mod users;

/// Turn a decision into its grant and mask, logging it either way.
pub(crate) fn authorize<P>(
    actor: &AuthContext,
    operation: &'static str,
    resource_id: Option<i64>,
    decision: Decision<P>,
) -> Result<(Grant, fn(P) -> P), AppError> {
    match decision.into_allowed() {
        Ok((grant, mask)) => {
            tracing::info!(
                actor_id = actor.user_id(),
                role = actor.role().as_str(),
                operation = operation,
                resource_id = resource_id,
                decision = "allow",
                grant = grant.as_str(),
                "authorization decision"
            );
            Ok((grant, mask))
        }
        Err(denied) => {
            tracing::warn!(
                actor_id = actor.user_id(),
                role = actor.role().as_str(),
                operation = operation,
                resource_id = resource_id,
                decision = "deny",
                "authorization decision"
            );
            Err(denied.into())
        }
    }
}

/// Apply the mask and record what it removed. Server-side only.
pub(crate) fn mask_patch<P: FieldPatch + Clone>(
    operation: &'static str,
    resource_id: i64,
    mask: fn(P) -> P,
    proposed: P,
) -> P {
    let masked = mask(proposed.clone());
    let dropped = mask::dropped_field_names(&proposed, &masked);
    if !dropped.is_empty() {
        tracing::debug!(
            operation = operation,
            resource_id = resource_id,
            dropped = ?dropped,
            "patch fields removed by mask"
        );
    }
    masked
}
