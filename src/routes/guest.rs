use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Guest Router Module
///
/// The sign-in and sign-up pages and their form targets.
pub fn guest_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /login
        .route("/login", get(handlers::login_view).post(handlers::login))
        // GET/POST /register
        // Registration signs the new account in straight away.
        .route(
            "/register",
            get(handlers::register_view).post(handlers::register),
        )
}
