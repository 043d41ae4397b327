//! Authorization decisions for every (resource, operation) pair.
//!
//! All functions are pure: they see the actor plus the ownership facts the
//! caller resolved from persisted state, and never the request body. Admins
//! get full patch authority; owners always get a masked patch.

use crate::actor::AuthContext;
use crate::agents::AgentPatch;
use crate::assignments::{AssignmentFacts, AssignmentPatch};
use crate::incidents::{IncidentFacts, IncidentPatch};
use crate::mask;
use crate::users::UserPatch;

/// Generic denial reason. Never more specific, so a failed check reveals
/// nothing about other users' data.
pub const FORBIDDEN: &str = "FORBIDDEN";

/// Why an allowed decision was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Admin,
    Owner,
}

impl Grant {
    pub fn as_str(self) -> &'static str {
        match self {
            Grant::Admin => "admin",
            Grant::Owner => "owner",
        }
    }
}

/// Outcome of an authorization check over patches of type `P`.
#[derive(Debug, Clone)]
pub enum Decision<P> {
    Allowed { grant: Grant, mask: fn(P) -> P },
    Denied { reason: &'static str },
}

/// A decision for operations that carry no patch (create, delete).
pub type Gate = Decision<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct Denied {
    pub reason: &'static str,
}

impl<P> Decision<P> {
    pub fn admin() -> Self {
        Decision::Allowed {
            grant: Grant::Admin,
            mask: mask::full,
        }
    }

    pub fn owner(mask: fn(P) -> P) -> Self {
        Decision::Allowed {
            grant: Grant::Owner,
            mask,
        }
    }

    pub fn denied() -> Self {
        Decision::Denied { reason: FORBIDDEN }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    pub fn grant(&self) -> Option<Grant> {
        match self {
            Decision::Allowed { grant, .. } => Some(*grant),
            Decision::Denied { .. } => None,
        }
    }

    /// Split an allowed decision into its grant and mask.
    pub fn into_allowed(self) -> Result<(Grant, fn(P) -> P), Denied> {
        match self {
            Decision::Allowed { grant, mask } => Ok((grant, mask)),
            Decision::Denied { reason } => Err(Denied { reason }),
        }
    }
}

fn admin_or_owner<P>(actor: &AuthContext, owner: Option<i64>, owner_mask: fn(P) -> P) -> Decision<P> {
    if actor.is_admin() {
        Decision::admin()
    } else if actor.owns(owner) {
        Decision::owner(owner_mask)
    } else {
        Decision::denied()
    }
}

fn admin_only<P>(actor: &AuthContext) -> Decision<P> {
    if actor.is_admin() {
        Decision::admin()
    } else {
        Decision::denied()
    }
}

/// Anyone authenticated may report an incident; the reporter is fixed by
/// `incidents::apply_creation_defaults`, not here.
pub fn can_create_incident(actor: &AuthContext) -> Gate {
    if actor.is_admin() {
        Decision::admin()
    } else {
        Decision::owner(mask::full)
    }
}

pub fn can_update_incident(actor: &AuthContext, facts: &IncidentFacts) -> Decision<IncidentPatch> {
    admin_or_owner(actor, facts.reporter_id, mask::owner)
}

pub fn can_delete_incident(actor: &AuthContext, facts: &IncidentFacts) -> Gate {
    admin_or_owner(actor, facts.reporter_id, mask::full)
}

// Owning an agent profile grants no self-service rights; agents are admin-managed.

pub fn can_create_agent(actor: &AuthContext) -> Gate {
    admin_only(actor)
}

pub fn can_update_agent(actor: &AuthContext) -> Decision<AgentPatch> {
    admin_only(actor)
}

pub fn can_delete_agent(actor: &AuthContext) -> Gate {
    admin_only(actor)
}

// Accounts are admin-managed; a user may only read their own.

pub fn can_read_user(actor: &AuthContext, user_id: i64) -> Gate {
    admin_or_owner(actor, Some(user_id), mask::full)
}

/// Listing, lookup by email, create and delete.
pub fn can_manage_users(actor: &AuthContext) -> Gate {
    admin_only(actor)
}

pub fn can_update_user(actor: &AuthContext) -> Decision<UserPatch> {
    admin_only(actor)
}

pub fn can_create_assignment(actor: &AuthContext, facts: &AssignmentFacts) -> Gate {
    admin_or_owner(actor, facts.agent_owner_user_id, mask::full)
}

pub fn can_update_assignment(
    actor: &AuthContext,
    facts: &AssignmentFacts,
) -> Decision<AssignmentPatch> {
    admin_or_owner(actor, facts.agent_owner_user_id, mask::owner)
}

pub fn can_delete_assignment(actor: &AuthContext, facts: &AssignmentFacts) -> Gate {
    admin_or_owner(actor, facts.agent_owner_user_id, mask::full)
}
