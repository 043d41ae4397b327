use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dispatch_core::error::{self, ApiError};
use dispatch_core::lifecycle::InvalidTransition;
use dispatch_core::policy::Denied;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Malformed input (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Missing or invalid credentials (401)
    Unauthorized {
        message: String,
        docs_hint: Option<String>,
    },
    /// Authorization decision denied (403). Carries no detail by construction.
    Forbidden,
    /// Id does not resolve to a row (404)
    NotFound { resource: String },
    /// Illegal state transition or constraint violation (409)
    Conflict {
        message: String,
        docs_hint: Option<String>,
    },
    /// Database error (500)
    Database(sqlx::Error),
    /// Internal error (500)
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: i64) -> Self {
        AppError::NotFound {
            resource: format!("{kind} {id}"),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
            received: None,
            docs_hint: None,
        }
    }
}

impl From<Denied> for AppError {
    fn from(_: Denied) -> Self {
        AppError::Forbidden
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        AppError::Conflict {
            message: err.to_string(),
            docs_hint: Some(format!(
                "Allowed next states from {}: {}",
                err.from,
                allowed_list(err.from)
            )),
        }
    }
}

fn allowed_list(from: dispatch_core::assignments::AssignmentStatus) -> String {
    let next = dispatch_core::lifecycle::next_states(from);
    if next.is_empty() {
        return "none (terminal state)".to_string();
    }
    next.iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_ERROR.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::Unauthorized { message, docs_hint } => (
                StatusCode::UNAUTHORIZED,
                ApiError {
                    error: error::codes::UNAUTHORIZED.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                ApiError {
                    error: error::codes::FORBIDDEN.to_string(),
                    message: dispatch_core::policy::FORBIDDEN.to_string(),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} not found"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::Conflict { message, docs_hint } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::CONFLICT.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            match db_err.code().as_deref() {
                // unique_violation, e.g. a second agent profile for one user
                Some("23505") => {
                    return AppError::Conflict {
                        message: "A row with the same unique key already exists".to_string(),
                        docs_hint: db_err
                            .constraint()
                            .map(|c| format!("Violated constraint: {c}")),
                    };
                }
                // foreign_key_violation
                Some("23503") => {
                    return AppError::Conflict {
                        message: "Referenced row does not exist or is still referenced"
                            .to_string(),
                        docs_hint: db_err
                            .constraint()
                            .map(|c| format!("Violated constraint: {c}")),
                    };
                }
                _ => {}
            }
        }
        AppError::Database(err)
    }
}
