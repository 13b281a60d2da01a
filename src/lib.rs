use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware::{from_fn, from_fn_with_state},
};
use utoipa::OpenApi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod csrf;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod request_validators;
pub mod response;
pub mod services;
pub mod session;
pub mod token;
pub mod validation;
pub mod views;

// Route tables (public, guest, authenticated).
pub mod routes;
use routes::public;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState};
pub use session::{MemorySessionStore, PostgresSessionStore, SessionManager, SessionStoreState};

use request_validators::RequestValidatorFactory;
use services::{CategoryService, UserProviderService};
use views::Views;

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints, served at `/api-docs/openapi.json`. The HTML pages
/// and form posts are not part of it.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::categories_get,
        handlers::categories_update,
        handlers::categories_delete,
        handlers::health
    ),
    components(schemas(models::CategoryResponse, models::CategoryData)),
    tags(
        (name = "expense-tracker", description = "Expense Tracker API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Everything a request may need, shared by all requests. Handlers pull out only the part they
/// use through the `FromRef` impls below.
#[derive(Clone)]
pub struct AppState {
    /// Persistence for users and categories.
    pub repo: RepositoryState,
    /// Session store plus cookie options.
    pub sessions: SessionManager,
    /// Compiled templates.
    pub views: Views,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the state together; fails only if a bundled template does not compile.
    pub fn new(
        repo: RepositoryState,
        session_store: SessionStoreState,
        config: AppConfig,
    ) -> Result<Self, minijinja::Error> {
        Ok(Self {
            sessions: SessionManager::new(session_store, config.session.clone()),
            views: Views::new()?,
            repo,
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(app_state: &AppState) -> SessionManager {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for Views {
    fn from_ref(app_state: &AppState) -> Views {
        app_state.views.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

// Services are cheap handles over the repository; they are built per extraction.

impl FromRef<AppState> for UserProviderService {
    fn from_ref(app_state: &AppState) -> UserProviderService {
        UserProviderService::new(app_state.repo.clone())
    }
}

impl FromRef<AppState> for CategoryService {
    fn from_ref(app_state: &AppState) -> CategoryService {
        CategoryService::new(app_state.repo.clone())
    }
}

impl FromRef<AppState> for RequestValidatorFactory {
    fn from_ref(app_state: &AppState) -> RequestValidatorFactory {
        RequestValidatorFactory::new(app_state.repo.clone())
    }
}

/// create_router
///
/// Assembles the routes and the middleware stack. Requests pass the layers in this order:
///
/// 1. request id and tracing
/// 2. `start_session`
/// 3. `old_form_data`, `validation_errors`
/// 4. `validation_exception`
/// 5. `csrf_guard`, `csrf_fields`
/// 6. `authenticate`
/// 7. the route's gate (`guest` or `require_auth`), then the handler
///
/// Public routes skip steps 2 to 7.
pub fn create_router(state: AppState) -> Router {
    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // `Router::layer` wraps what is already there, so the innermost layer comes first.
    let session_routes = Router::new()
        .merge(routes::gated_guest_routes(state.clone()))
        .merge(routes::gated_authenticated_routes(state.clone()))
        .layer(from_fn_with_state(state.clone(), middleware::authenticate))
        .layer(from_fn(middleware::csrf_fields))
        .layer(from_fn(middleware::csrf_guard))
        .layer(from_fn(middleware::validation_exception))
        .layer(from_fn(middleware::validation_errors))
        .layer(from_fn(middleware::old_form_data))
        .layer(from_fn_with_state(state.clone(), middleware::start_session));

    Router::new()
        .merge(session_routes)
        .merge(public::public_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                // Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // Request Tracing: one span per request, carrying the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` header, so every log line
/// of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
