use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use dispatch_core::actor::{AuthContext, Role};

use crate::error::AppError;
use crate::state::AppState;

const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Access-token claims. `sub` carries the numeric user id as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    pub exp: u64,
}

/// Verifies HS256 access tokens issued by the account service.
#[derive(Clone)]
pub struct TokenVerifier {
    key: Arc<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthContext, AppError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation).map_err(
            |err| {
                tracing::debug!(error = %err, "access token rejected");
                AppError::Unauthorized {
                    message: "Invalid or expired token".to_string(),
                    docs_hint: None,
                }
            },
        )?;

        let user_id: i64 = data
            .claims
            .sub
            .trim()
            .parse()
            .map_err(|_| AppError::Unauthorized {
                message: "Token subject is not a user id".to_string(),
                docs_hint: None,
            })?;

        let role = if data.claims.is_admin {
            Role::Admin
        } else {
            Role::User
        };
        Ok(AuthContext::new(user_id, role))
    }
}

/// The authenticated actor of a request.
///
/// Read from `Authorization: Bearer <token>`, falling back to the
/// `accessToken` cookie set by the web client.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub AuthContext);

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing access token".to_string(),
                docs_hint: Some("Format: 'Authorization: Bearer <token>'".to_string()),
            })?;

        state.tokens.verify(&token).map(Actor)
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Raw value of the `accessToken` cookie. Values are taken verbatim: a
/// double-quoted value keeps its quotes and then fails verification. The web
/// client sets the token unquoted.
fn cookie_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.to_owned())
        .filter(|s| !s.is_empty())
}
