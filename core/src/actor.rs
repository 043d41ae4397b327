use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role carried by an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

/// The identity performing an operation.
///
/// Built by the transport layer from a verified token and dropped at the end
/// of the request. Fields are private so a context cannot be altered once
/// constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    user_id: i64,
    role: Role,
}

impl AuthContext {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn admin(user_id: i64) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn user(user_id: i64) -> Self {
        Self::new(user_id, Role::User)
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True when `owner` names this actor. A missing owner never matches.
    pub fn owns(&self, owner: Option<i64>) -> bool {
        owner == Some(self.user_id)
    }
}
