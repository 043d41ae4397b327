//! Field-level masking of proposed patches.
//!
//! Each patch type lists its fields and the subset an owner may write. Masking
//! copies allow-listed fields one at a time into an empty patch, so a field
//! added to a patch type stays unwritable for owners until it is explicitly
//! added to that list.

use crate::agents::AgentPatch;
use crate::assignments::AssignmentPatch;
use crate::incidents::IncidentPatch;
use crate::policy::Grant;
use crate::users::UserPatch;

/// A patch whose fields can be inspected and copied individually.
pub trait FieldPatch: Default {
    type Field: Copy + Eq + std::fmt::Debug + 'static;

    /// Every field of the patch.
    const FIELDS: &'static [Self::Field];

    /// Fields a non-admin owner may write.
    const OWNER_WRITABLE: &'static [Self::Field];

    fn is_set(&self, field: Self::Field) -> bool;

    /// Copy one field from `source` into `self`, leaving the rest alone.
    fn copy_field(&mut self, source: &Self, field: Self::Field);

    fn field_name(field: Self::Field) -> &'static str;

    fn present_fields(&self) -> Vec<Self::Field> {
        Self::FIELDS
            .iter()
            .copied()
            .filter(|field| self.is_set(*field))
            .collect()
    }

    fn is_empty(&self) -> bool {
        Self::FIELDS.iter().all(|field| !self.is_set(*field))
    }
}

/// Allow-list for a patch type under a given grant.
pub fn writable_fields<P: FieldPatch>(grant: Grant) -> &'static [P::Field] {
    match grant {
        Grant::Admin => P::FIELDS,
        Grant::Owner => P::OWNER_WRITABLE,
    }
}

/// Keep only the fields of `patch` that are both present and in `allowed`.
pub fn retain_fields<P: FieldPatch>(patch: &P, allowed: &[P::Field]) -> P {
    let mut out = P::default();
    for field in allowed {
        if patch.is_set(*field) {
            out.copy_field(patch, *field);
        }
    }
    out
}

/// Mask applied to admin patches.
pub fn full<P>(patch: P) -> P {
    patch
}

/// Mask applied to owner patches.
pub fn owner<P: FieldPatch>(patch: P) -> P {
    retain_fields(&patch, P::OWNER_WRITABLE)
}

/// Names of the fields `masked` dropped from `proposed`. For server-side logs.
pub fn dropped_field_names<P: FieldPatch>(proposed: &P, masked: &P) -> Vec<&'static str> {
    proposed
        .present_fields()
        .into_iter()
        .filter(|field| !masked.is_set(*field))
        .map(P::field_name)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentField {
    TypeIncident,
    Message,
    Latitude,
    Longitude,
    Address,
    ReporterId,
    Status,
}

impl FieldPatch for IncidentPatch {
    type Field = IncidentField;

    const FIELDS: &'static [IncidentField] = &[
        IncidentField::TypeIncident,
        IncidentField::Message,
        IncidentField::Latitude,
        IncidentField::Longitude,
        IncidentField::Address,
        IncidentField::ReporterId,
        IncidentField::Status,
    ];

    const OWNER_WRITABLE: &'static [IncidentField] = &[
        IncidentField::Message,
        IncidentField::Latitude,
        IncidentField::Longitude,
        IncidentField::Address,
    ];

    fn is_set(&self, field: IncidentField) -> bool {
        match field {
            IncidentField::TypeIncident => self.type_incident.is_some(),
            IncidentField::Message => self.message.is_some(),
            IncidentField::Latitude => self.latitude.is_some(),
            IncidentField::Longitude => self.longitude.is_some(),
            IncidentField::Address => self.address.is_some(),
            IncidentField::ReporterId => self.reporter_id.is_some(),
            IncidentField::Status => self.status.is_some(),
        }
    }

    fn copy_field(&mut self, source: &Self, field: IncidentField) {
        match field {
            IncidentField::TypeIncident => self.type_incident = source.type_incident,
            IncidentField::Message => self.message = source.message.clone(),
            IncidentField::Latitude => self.latitude = source.latitude,
            IncidentField::Longitude => self.longitude = source.longitude,
            IncidentField::Address => self.address = source.address.clone(),
            IncidentField::ReporterId => self.reporter_id = source.reporter_id,
            IncidentField::Status => self.status = source.status,
        }
    }

    fn field_name(field: IncidentField) -> &'static str {
        match field {
            IncidentField::TypeIncident => "typeIncident",
            IncidentField::Message => "message",
            IncidentField::Latitude => "latitude",
            IncidentField::Longitude => "longitude",
            IncidentField::Address => "address",
            IncidentField::ReporterId => "reporterId",
            IncidentField::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentField {
    AgentName,
    AgentType,
    Status,
    Capacity,
    Jurisdiction,
    IsOnCall,
    AutoAccept,
    LastSeenAt,
}

impl FieldPatch for AgentPatch {
    type Field = AgentField;

    const FIELDS: &'static [AgentField] = &[
        AgentField::AgentName,
        AgentField::AgentType,
        AgentField::Status,
        AgentField::Capacity,
        AgentField::Jurisdiction,
        AgentField::IsOnCall,
        AgentField::AutoAccept,
        AgentField::LastSeenAt,
    ];

    // Agent profiles are admin-managed; owning one grants no write access.
    const OWNER_WRITABLE: &'static [AgentField] = &[];

    fn is_set(&self, field: AgentField) -> bool {
        match field {
            AgentField::AgentName => self.agent_name.is_some(),
            AgentField::AgentType => self.agent_type.is_some(),
            AgentField::Status => self.status.is_some(),
            AgentField::Capacity => self.capacity.is_some(),
            AgentField::Jurisdiction => self.jurisdiction.is_some(),
            AgentField::IsOnCall => self.is_on_call.is_some(),
            AgentField::AutoAccept => self.auto_accept.is_some(),
            AgentField::LastSeenAt => self.last_seen_at.is_some(),
        }
    }

    fn copy_field(&mut self, source: &Self, field: AgentField) {
        match field {
            AgentField::AgentName => self.agent_name = source.agent_name.clone(),
            AgentField::AgentType => self.agent_type = source.agent_type.clone(),
            AgentField::Status => self.status = source.status,
            AgentField::Capacity => self.capacity = source.capacity,
            AgentField::Jurisdiction => self.jurisdiction = source.jurisdiction.clone(),
            AgentField::IsOnCall => self.is_on_call = source.is_on_call,
            AgentField::AutoAccept => self.auto_accept = source.auto_accept,
            AgentField::LastSeenAt => self.last_seen_at = source.last_seen_at,
        }
    }

    fn field_name(field: AgentField) -> &'static str {
        match field {
            AgentField::AgentName => "agentName",
            AgentField::AgentType => "agentType",
            AgentField::Status => "status",
            AgentField::Capacity => "capacity",
            AgentField::Jurisdiction => "jurisdiction",
            AgentField::IsOnCall => "isOnCall",
            AgentField::AutoAccept => "autoAccept",
            AgentField::LastSeenAt => "lastSeenAt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentField {
    IncidentId,
    AgentId,
    Status,
    Notes,
    SlaDueAt,
    AcceptedAt,
    StartedAt,
    ResolvedAt,
    ClosedAt,
}

impl FieldPatch for AssignmentPatch {
    type Field = AssignmentField;

    const FIELDS: &'static [AssignmentField] = &[
        AssignmentField::IncidentId,
        AssignmentField::AgentId,
        AssignmentField::Status,
        AssignmentField::Notes,
        AssignmentField::SlaDueAt,
        AssignmentField::AcceptedAt,
        AssignmentField::StartedAt,
        AssignmentField::ResolvedAt,
        AssignmentField::ClosedAt,
    ];

    // Re-linking (incidentId / agentId) is reserved for admins.
    const OWNER_WRITABLE: &'static [AssignmentField] = &[
        AssignmentField::Status,
        AssignmentField::Notes,
        AssignmentField::SlaDueAt,
        AssignmentField::AcceptedAt,
        AssignmentField::StartedAt,
        AssignmentField::ResolvedAt,
        AssignmentField::ClosedAt,
    ];

    fn is_set(&self, field: AssignmentField) -> bool {
        match field {
            AssignmentField::IncidentId => self.incident_id.is_some(),
            AssignmentField::AgentId => self.agent_id.is_some(),
            AssignmentField::Status => self.status.is_some(),
            AssignmentField::Notes => self.notes.is_some(),
            AssignmentField::SlaDueAt => self.sla_due_at.is_some(),
            AssignmentField::AcceptedAt => self.accepted_at.is_some(),
            AssignmentField::StartedAt => self.started_at.is_some(),
            AssignmentField::ResolvedAt => self.resolved_at.is_some(),
            AssignmentField::ClosedAt => self.closed_at.is_some(),
        }
    }

    fn copy_field(&mut self, source: &Self, field: AssignmentField) {
        match field {
            AssignmentField::IncidentId => self.incident_id = source.incident_id,
            AssignmentField::AgentId => self.agent_id = source.agent_id,
            AssignmentField::Status => self.status = source.status,
            AssignmentField::Notes => self.notes = source.notes.clone(),
            AssignmentField::SlaDueAt => self.sla_due_at = source.sla_due_at,
            AssignmentField::AcceptedAt => self.accepted_at = source.accepted_at,
            AssignmentField::StartedAt => self.started_at = source.started_at,
            AssignmentField::ResolvedAt => self.resolved_at = source.resolved_at,
            AssignmentField::ClosedAt => self.closed_at = source.closed_at,
        }
    }

    fn field_name(field: AssignmentField) -> &'static str {
        match field {
            AssignmentField::IncidentId => "incidentId",
            AssignmentField::AgentId => "agentId",
            AssignmentField::Status => "status",
            AssignmentField::Notes => "notes",
            AssignmentField::SlaDueAt => "slaDueAt",
            AssignmentField::AcceptedAt => "acceptedAt",
            AssignmentField::StartedAt => "startedAt",
            AssignmentField::ResolvedAt => "resolvedAt",
            AssignmentField::ClosedAt => "closedAt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Name,
    Email,
    IsAdmin,
}

impl FieldPatch for UserPatch {
    type Field = UserField;

    const FIELDS: &'static [UserField] = &[UserField::Name, UserField::Email, UserField::IsAdmin];

    const OWNER_WRITABLE: &'static [UserField] = &[];

    fn is_set(&self, field: UserField) -> bool {
        match field {
            UserField::Name => self.name.is_some(),
            UserField::Email => self.email.is_some(),
            UserField::IsAdmin => self.is_admin.is_some(),
        }
    }

    fn copy_field(&mut self, source: &Self, field: UserField) {
        match field {
            UserField::Name => self.name = source.name.clone(),
            UserField::Email => self.email = source.email.clone(),
            UserField::IsAdmin => self.is_admin = source.is_admin,
        }
    }

    fn field_name(field: UserField) -> &'static str {
        match field {
            UserField::Name => "name",
            UserField::Email => "email",
            UserField::IsAdmin => "isAdmin",
        }
    }
}
