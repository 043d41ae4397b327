//! Assignment status transitions.
//!
//! ```text
//! ASSIGNED ──► ACCEPTED ──► IN_PROGRESS ◄──► ON_HOLD
//!    │                          │               │
//!    ▼                          └──► RESOLVED ◄─┘
//! REJECTED                           │
//!                                    ▼
//!                                  CLOSED
//! ```
//! `ACCEPTED` may also go straight to `ON_HOLD`. `REJECTED` and `CLOSED` are
//! terminal. Who may request a transition is decided in [`crate::policy`].

use chrono::{DateTime, Utc};

use crate::assignments::{AssignmentPatch, AssignmentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move assignment from {from} to {to}")]
pub struct InvalidTransition {
    pub from: AssignmentStatus,
    pub to: AssignmentStatus,
}

/// Assignment timestamp columns stamped by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    AcceptedAt,
    StartedAt,
    ResolvedAt,
    ClosedAt,
}

/// States reachable from `from` in one step.
pub fn next_states(from: AssignmentStatus) -> &'static [AssignmentStatus] {
    use AssignmentStatus::*;
    match from {
        Assigned => &[Accepted, Rejected],
        Accepted => &[InProgress, OnHold],
        InProgress => &[OnHold, Resolved],
        OnHold => &[InProgress, Resolved],
        Resolved => &[Closed],
        Rejected | Closed => &[],
    }
}

pub fn is_terminal(status: AssignmentStatus) -> bool {
    next_states(status).is_empty()
}

pub fn validate_transition(
    from: AssignmentStatus,
    to: AssignmentStatus,
) -> Result<(), InvalidTransition> {
    if next_states(from).contains(&to) {
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}

/// Timestamp a legal transition records, if any.
///
/// Resuming from `ON_HOLD` keeps the original `startedAt`.
pub fn milestone(from: AssignmentStatus, to: AssignmentStatus) -> Option<Milestone> {
    use AssignmentStatus::*;
    match (from, to) {
        (_, Accepted) => Some(Milestone::AcceptedAt),
        (Assigned | Accepted, InProgress) => Some(Milestone::StartedAt),
        (_, Resolved) => Some(Milestone::ResolvedAt),
        (_, Closed) => Some(Milestone::ClosedAt),
        _ => None,
    }
}

/// Validate the status change carried by `patch` and stamp its milestone.
///
/// A patch without `status` is always valid and left untouched. A milestone
/// the caller already supplied (even as an explicit `null`) is kept as is.
pub fn apply_transition(
    current: AssignmentStatus,
    patch: &mut AssignmentPatch,
    now: DateTime<Utc>,
) -> Result<(), InvalidTransition> {
    let Some(requested) = patch.status else {
        return Ok(());
    };

    validate_transition(current, requested)?;

    let slot = match milestone(current, requested) {
        Some(Milestone::AcceptedAt) => &mut patch.accepted_at,
        Some(Milestone::StartedAt) => &mut patch.started_at,
        Some(Milestone::ResolvedAt) => &mut patch.resolved_at,
        Some(Milestone::ClosedAt) => &mut patch.closed_at,
        None => return Ok(()),
    };
    if slot.is_none() {
        *slot = Some(Some(now));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use AssignmentStatus::*;

    const TABLE: &[(AssignmentStatus, AssignmentStatus)] = &[
        (Assigned, Accepted),
        (Assigned, Rejected),
        (Accepted, InProgress),
        (Accepted, OnHold),
        (InProgress, OnHold),
        (InProgress, Resolved),
        (OnHold, InProgress),
        (OnHold, Resolved),
        (Resolved, Closed),
    ];

    #[test]
    fn only_listed_pairs_are_legal() {
        for from in AssignmentStatus::ALL {
            for to in AssignmentStatus::ALL {
                let listed = TABLE.contains(&(*from, *to));
                let result = validate_transition(*from, *to);
                assert_eq!(result.is_ok(), listed, "{from} -> {to}");
                if !listed {
                    assert_eq!(result.unwrap_err(), InvalidTransition { from: *from, to: *to });
                }
            }
        }
    }

    #[test]
    fn rejected_and_closed_are_terminal() {
        assert!(is_terminal(Rejected));
        assert!(is_terminal(Closed));
        assert!(!is_terminal(Resolved));
    }

    #[test]
    fn legal_transitions_stamp_missing_milestone() {
        let now = Utc::now();
        for (from, to) in TABLE {
            let mut patch = AssignmentPatch {
                status: Some(*to),
                ..AssignmentPatch::default()
            };
            apply_transition(*from, &mut patch, now).unwrap();

            let stamped = match milestone(*from, *to) {
                Some(Milestone::AcceptedAt) => patch.accepted_at,
                Some(Milestone::StartedAt) => patch.started_at,
                Some(Milestone::ResolvedAt) => patch.resolved_at,
                Some(Milestone::ClosedAt) => patch.closed_at,
                None => {
                    assert_eq!(patch.started_at, None, "{from} -> {to}");
                    continue;
                }
            };
            assert_eq!(stamped, Some(Some(now)), "{from} -> {to}");
        }
    }

    #[test]
    fn supplied_milestone_is_kept() {
        let earlier = Utc::now() - chrono::Duration::minutes(5);
        let mut patch = AssignmentPatch {
            status: Some(Accepted),
            accepted_at: Some(Some(earlier)),
            ..AssignmentPatch::default()
        };
        apply_transition(Assigned, &mut patch, Utc::now()).unwrap();
        assert_eq!(patch.accepted_at, Some(Some(earlier)));
    }

    #[test]
    fn resuming_from_hold_keeps_started_at() {
        assert_eq!(milestone(OnHold, InProgress), None);
        assert_eq!(milestone(Accepted, InProgress), Some(Milestone::StartedAt));
    }

    #[test]
    fn patch_without_status_is_a_no_op() {
        let mut patch = AssignmentPatch {
            notes: Some(Some("on my way".to_string())),
            ..AssignmentPatch::default()
        };
        let before = patch.clone();
        apply_transition(Closed, &mut patch, Utc::now()).unwrap();
        assert_eq!(patch, before);
    }

    #[test]
    fn illegal_transition_leaves_patch_unstamped() {
        let mut patch = AssignmentPatch {
            status: Some(Closed),
            ..AssignmentPatch::default()
        };
        let err = apply_transition(Accepted, &mut patch, Utc::now()).unwrap_err();
        assert_eq!(err, InvalidTransition { from: Accepted, to: Closed });
        assert_eq!(patch.closed_at, None);
    }
}
