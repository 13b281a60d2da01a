use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every handler here takes an `AuthUser`, and every category query is scoped to that user's
/// id, so one account can never read or change another account's categories.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /
        // Dashboard.
        .route("/", get(handlers::home))
        // POST /logout
        .route("/logout", post(handlers::logout))
        // GET/POST /categories
        // List view with the create form; the form posts back here.
        .route(
            "/categories",
            get(handlers::categories_index).post(handlers::categories_store),
        )
        // GET/POST/DELETE /categories/{id}
        // JSON read and rename for the edit dialog, and delete. A category owned by someone
        // else answers 404.
        .route(
            "/categories/{id}",
            get(handlers::categories_get)
                .post(handlers::categories_update)
                .delete(handlers::categories_delete),
        )
}
