use axum::Router;

use crate::error::AppError;
use crate::state::AppState;

pub mod agents;
pub mod assignments;
pub mod health;
pub mod incidents;
pub mod map;
pub mod users;

/// All authenticated `/v1` routes, without rate limiting.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(incidents::router())
        .merge(agents::router())
        .merge(assignments::router())
        .merge(map::router())
        .merge(users::router())
}

// --- Field checks shared by the handlers ---

/// Blank padding does not count toward `min` but is stored, so it counts
/// toward `max`.
pub(crate) fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    if value.trim().chars().count() < min || value.chars().count() > max {
        return Err(AppError::Validation {
            message: format!("{field} must be between {min} and {max} characters"),
            field: Some(field.to_string()),
            received: Some(serde_json::Value::String(value.to_string())),
            docs_hint: None,
        });
    }
    Ok(())
}

pub(crate) fn check_opt_len(field: &str, value: Option<&str>, max: usize) -> Result<(), AppError> {
    match value {
        Some(v) => check_len(field, v, 0, max),
        None => Ok(()),
    }
}

pub(crate) fn check_range(field: &str, value: Option<f64>, min: f64, max: f64) -> Result<(), AppError> {
    match value {
        Some(v) if !v.is_finite() || v < min || v > max => Err(AppError::Validation {
            message: format!("{field} must be between {min} and {max}"),
            field: Some(field.to_string()),
            received: Some(serde_json::json!(v)),
            docs_hint: None,
        }),
        _ => Ok(()),
    }
}

pub(crate) fn check_positive(field: &str, value: i64) -> Result<(), AppError> {
    if value < 1 {
        return Err(AppError::Validation {
            message: format!("{field} must be a positive id"),
            field: Some(field.to_string()),
            received: Some(serde_json::json!(value)),
            docs_hint: None,
        });
    }
    Ok(())
}

pub(crate) fn require_fields(empty: bool) -> Result<(), AppError> {
    if empty {
        return Err(AppError::Validation {
            message: "Patch must contain at least one field".to_string(),
            field: Some("body".to_string()),
            received: None,
            docs_hint: None,
        });
    }
    Ok(())
}
