use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An account. Credentials live with the auth service and never pass
/// through here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /v1/users`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<CreateUserRequest> for NewUser {
    fn from(req: CreateUserRequest) -> Self {
        NewUser {
            name: req.name.trim().to_string(),
            email: normalize_email(&req.email),
            is_admin: req.is_admin,
        }
    }
}

/// Partial update of an account. Admin-only, never masked.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

impl UserPatch {
    /// Same patch with `name` trimmed and `email` normalized.
    pub fn normalized(self) -> Self {
        UserPatch {
            name: self.name.map(|n| n.trim().to_string()),
            email: self.email.as_deref().map(normalize_email),
            is_admin: self.is_admin,
        }
    }
}

/// Emails are stored trimmed and lowercased so the unique key is
/// case-insensitive.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Structural check only: one `@` with a non-empty local part and a dotted
/// domain. Deliverability is the auth service's problem.
pub fn looks_like_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !domain.contains(char::is_whitespace)
        && !local.contains(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}
