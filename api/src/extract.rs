//! Body and query extractors whose rejections are `VALIDATION_ERROR`s.
//!
//! Handlers take `AppJson<T>` / `AppQuery<T>` so a bad payload is answered
//! with the same JSON error envelope as every other failure.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Query, Request,
        rejection::{JsonRejection, QueryRejection},
    },
    http::request::Parts,
};

use crate::error::AppError;

const SCHEMA_HINT: &str = "Compare the body with the operation's schema at /api-doc/openapi.json.";

pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| AppJson(value))
            .map_err(|rejection| body_error(&rejection.body_text()))
    }
}

pub struct AppQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| AppQuery(value))
            .map_err(|rejection| query_error(&rejection.body_text()))
    }
}

/// Body errors always name a field, falling back to `body`.
fn body_error(detail: &str) -> AppError {
    AppError::Validation {
        message: format!("Invalid request body: {detail}"),
        field: Some(serde_field_hint(detail).unwrap_or_else(|| "body".to_string())),
        received: None,
        docs_hint: Some(SCHEMA_HINT.to_string()),
    }
}

fn query_error(detail: &str) -> AppError {
    AppError::Validation {
        message: format!("Invalid query string: {detail}"),
        field: serde_field_hint(detail),
        received: None,
        docs_hint: None,
    }
}

/// Field named in serde's "missing field" / "unknown field" messages.
fn serde_field_hint(detail: &str) -> Option<String> {
    ["missing field `", "unknown field `"]
        .iter()
        .find_map(|marker| detail.split_once(marker))
        .and_then(|(_, rest)| rest.split_once('`'))
        .map(|(field, _)| field.to_string())
}
