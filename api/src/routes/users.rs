use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use dispatch_core::mask::FieldPatch;
use dispatch_core::pagination::{Page, PageRequest};
use dispatch_core::users::{self, CreateUserRequest, User, UserPatch};

use super::{check_len, check_opt_len, require_fields};
use crate::auth::Actor;
use crate::error::AppError;
use crate::extract::{AppJson, AppQuery};
use crate::services;
use crate::state::AppState;
use crate::store::UserFilter;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/users", get(list_users).post(create_user))
        .route(
            "/v1/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/v1/users/email/{email}", get(get_user_by_email))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListUsersParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// Case-insensitive substring of the name or the email
    pub search: Option<String>,
    pub is_admin: Option<bool>,
}

fn check_email(email: &str) -> Result<(), AppError> {
    check_len("email", email, 3, 254)?;
    if !users::looks_like_email(email) {
        return Err(AppError::Validation {
            message: "email must look like name@domain.tld".to_string(),
            field: Some("email".to_string()),
            received: Some(serde_json::Value::String(email.to_string())),
            docs_hint: None,
        });
    }
    Ok(())
}

fn validate_create(req: &CreateUserRequest) -> Result<(), AppError> {
    check_len("name", &req.name, 2, 80)?;
    check_email(&req.email)
}

fn validate_patch(patch: &UserPatch) -> Result<(), AppError> {
    require_fields(patch.is_empty())?;
    if let Some(name) = &patch.name {
        check_len("name", name, 2, 80)?;
    }
    match &patch.email {
        Some(email) => check_email(email),
        None => Ok(()),
    }
}

/// GET /v1/users: list accounts by id (admin only)
#[utoipa::path(
    get,
    path = "/v1/users",
    params(ListUsersParams),
    responses(
        (status = 200, description = "One page of users", body = Page<User>),
        (status = 403, description = "Caller is not an admin", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    Actor(actor): Actor,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListUsersParams>,
) -> Result<Json<Page<User>>, AppError> {
    check_opt_len("search", params.search.as_deref(), 120)?;
    let filter = UserFilter {
        search: params.search.filter(|s| !s.trim().is_empty()),
        is_admin: params.is_admin,
    };
    let page = PageRequest::new(params.page, params.page_size);
    Ok(Json(
        services::users::list(state.store.as_ref(), &actor, &filter, page).await?,
    ))
}

/// POST /v1/users: create an account (admin only)
///
/// The email is stored trimmed and lowercased and must be unique.
#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid request", body = dispatch_core::error::ApiError),
        (status = 403, description = "Caller is not an admin", body = dispatch_core::error::ApiError),
        (status = 409, description = "Email already registered", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user(
    Actor(actor): Actor,
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    validate_create(&req)?;
    let created = services::users::create(state.store.as_ref(), &actor, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /v1/users/{id}: admins read anyone, users only themselves
#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = User),
        (status = 403, description = "Another user's account", body = dispatch_core::error::ApiError),
        (status = 404, description = "No such user", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, AppError> {
    Ok(Json(services::users::get(state.store.as_ref(), &actor, id).await?))
}

#[utoipa::path(
    get,
    path = "/v1/users/email/{email}",
    params(("email" = String, Path, description = "Email address, any case")),
    responses(
        (status = 200, description = "The user", body = User),
        (status = 403, description = "Caller is not an admin", body = dispatch_core::error::ApiError),
        (status = 404, description = "No user with that email", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user_by_email(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(
        services::users::get_by_email(state.store.as_ref(), &actor, &email).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "User after the update", body = User),
        (status = 400, description = "Invalid patch", body = dispatch_core::error::ApiError),
        (status = 403, description = "Caller is not an admin", body = dispatch_core::error::ApiError),
        (status = 404, description = "No such user", body = dispatch_core::error::ApiError),
        (status = 409, description = "Email already registered", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<UserPatch>,
) -> Result<Json<User>, AppError> {
    validate_patch(&patch)?;
    let updated = services::users::update(state.store.as_ref(), &actor, id, patch).await?;
    Ok(Json(updated))
}

/// DELETE /v1/users/{id}: remove an account (admin only)
///
/// Incidents the user reported are kept without a reporter; their agent
/// profile and its assignments are deleted.
#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Caller is not an admin", body = dispatch_core::error::ApiError),
        (status = 404, description = "No such user", body = dispatch_core::error::ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    services::users::delete(state.store.as_ref(), &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::testing::{admin, app, send, user};
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn admin_account_lifecycle_over_http() {
        let app = app(MemoryStore::seeded());
        let body = json!({ "name": "Rocio Benitez", "email": "Rocio@Central.Example" });

        let (status, created) = send(&app, "POST", "/v1/users", Some(&admin()), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["email"], "rocio@central.example");
        assert_eq!(created["isAdmin"], false);
        assert!(created.get("password").is_none());
        let uri = format!("/v1/users/{}", created["id"]);

        let (status, err) = send(&app, "POST", "/v1/users", Some(&admin()), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"], "CONFLICT");

        let (status, found) = send(
            &app,
            "GET",
            "/v1/users/email/ROCIO@central.example",
            Some(&admin()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["id"], created["id"]);

        let (status, updated) = send(&app, "PATCH", &uri, Some(&admin()), Some(json!({ "isAdmin": true }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["isAdmin"], true);

        let (status, _) = send(&app, "DELETE", &uri, Some(&admin()), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &uri, Some(&admin()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_admins_reach_only_their_own_account() {
        let app = app(MemoryStore::seeded());
        let me = user(5);

        let (status, body) = send(&app, "GET", "/v1/users/5", Some(&me), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "user5@dispatch.test");

        for (method, uri, body) in [
            ("GET", "/v1/users/6", None),
            ("GET", "/v1/users", None),
            ("GET", "/v1/users/email/user6@dispatch.test", None),
            ("PATCH", "/v1/users/5", Some(json!({ "isAdmin": true }))),
            ("DELETE", "/v1/users/6", None),
            ("POST", "/v1/users", Some(json!({ "name": "Me Again", "email": "me@x.example" }))),
        ] {
            let (status, err) = send(&app, method, uri, Some(&me), body).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
            assert_eq!(err["message"], "FORBIDDEN");
        }
    }

    #[tokio::test]
    async fn invalid_user_bodies_are_rejected() {
        let app = app(MemoryStore::seeded());

        let body = json!({ "name": "X", "email": "x@dispatch.example" });
        let (status, err) = send(&app, "POST", "/v1/users", Some(&admin()), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["field"], "name");

        let body = json!({ "name": "No Domain", "email": "nodomain" });
        let (status, err) = send(&app, "POST", "/v1/users", Some(&admin()), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["field"], "email");

        let (status, _) = send(&app, "PATCH", "/v1/users/3", Some(&admin()), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/v1/users?search={}", "q".repeat(121));
        let (status, err) = send(&app, "GET", &uri, Some(&admin()), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["field"], "search");
    }

    #[tokio::test]
    async fn list_pages_by_id_with_search() {
        let app = app(MemoryStore::seeded());
        let (status, page) = send(&app, "GET", "/v1/users?pageSize=5&page=3", Some(&admin()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 12);
        assert_eq!(page["items"][0]["id"], 11);

        let (_, page) = send(&app, "GET", "/v1/users?search=USER12", Some(&admin()), None).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["name"], "User 12");
    }
}
