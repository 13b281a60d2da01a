use crate::{AppState, ApiDoc, handlers};
use axum::{Json, Router, routing::get};
use utoipa::OpenApi;

/// Public Router Module
///
/// Endpoints served without a session: no cookie is read or set and no CSRF check applies.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Used for monitoring and load balancer checks.
        .route("/health", get(handlers::health))
        // GET /api-docs/openapi.json
        // The generated OpenAPI document for the JSON endpoints.
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
}
