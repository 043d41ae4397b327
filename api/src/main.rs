use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod config;
mod error;
mod extract;
mod middleware;
mod routes;
mod services;
mod state;
mod store;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Incident Dispatch API",
        version = "0.1.0",
        description = "Incident reports, responder profiles, dispatch assignments and the accounts behind them."
    ),
    paths(
        routes::health::health_check,
        routes::incidents::list_incidents,
        routes::incidents::create_incident,
        routes::incidents::get_incident,
        routes::incidents::update_incident,
        routes::incidents::delete_incident,
        routes::incidents::list_incident_assignments,
        routes::agents::list_agents,
        routes::agents::create_agent,
        routes::agents::get_agent,
        routes::agents::update_agent,
        routes::agents::delete_agent,
        routes::assignments::list_assignments,
        routes::assignments::create_assignment,
        routes::assignments::get_assignment,
        routes::assignments::update_assignment,
        routes::assignments::delete_assignment,
        routes::map::map_incidents,
        routes::users::list_users,
        routes::users::create_user,
        routes::users::get_user,
        routes::users::get_user_by_email,
        routes::users::update_user,
        routes::users::delete_user,
    ),
    components(schemas(
        routes::health::HealthResponse,
        dispatch_core::error::ApiError,
        dispatch_core::incidents::Incident,
        dispatch_core::incidents::IncidentType,
        dispatch_core::incidents::IncidentStatus,
        dispatch_core::incidents::CreateIncidentRequest,
        dispatch_core::incidents::IncidentPatch,
        dispatch_core::agents::Agent,
        dispatch_core::agents::AgentStatus,
        dispatch_core::agents::CreateAgentRequest,
        dispatch_core::agents::AgentPatch,
        dispatch_core::assignments::Assignment,
        dispatch_core::assignments::AssignmentStatus,
        dispatch_core::assignments::CreateAssignmentRequest,
        dispatch_core::assignments::AssignmentPatch,
        dispatch_core::pagination::Page<dispatch_core::incidents::Incident>,
        dispatch_core::pagination::Page<dispatch_core::agents::Agent>,
        dispatch_core::pagination::Page<dispatch_core::assignments::Assignment>,
        dispatch_core::pagination::Page<dispatch_core::users::User>,
        dispatch_core::users::User,
        dispatch_core::users::CreateUserRequest,
        dispatch_core::users::UserPatch,
        dispatch_core::geo::FeatureCollection,
        dispatch_core::geo::Feature,
        dispatch_core::geo::Point,
        dispatch_core::geo::FeatureProperties,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dispatch_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = config::Config::from_env().expect("Invalid configuration");
    tracing::debug!(?config, "configuration loaded");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let app_state = state::AppState {
        store: Arc::new(store::postgres::PgStore::new(pool)),
        tokens: auth::TokenVerifier::new(&config.jwt_secret),
    };

    let cors_layer = middleware::cors::build_cors_layer(&config.cors_origins);

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::api_router().layer(middleware::rate_limit::api_layer()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let addr = config.listen_addr();
    tracing::info!("Dispatch API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
